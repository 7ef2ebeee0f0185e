use std::fmt::Debug;

use mm_tensor::{Matrix, Order};

use crate::error::Result;

/// A way of computing C = A × B for square matrices of one order.
///
/// Implementations write the product into `c`, which the caller zeroes
/// beforehand; strategies that accumulate (`C[i,j] += ...`) rely on that.
/// `multiply` returns only after every worker it started has finished.
pub trait Multiplier: Send + Sync + Debug {
    /// Short identifier (e.g. "reference", "naive", "tiled").
    fn name(&self) -> &str;

    /// Human-readable banner for reports.
    fn describe(&self, order: Order) -> String;

    /// Compute C = A × B.
    fn multiply(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<()>;
}

/// Checks that A, B and C share one order and returns it.
pub(crate) fn common_order(a: &Matrix, b: &Matrix, c: &Matrix) -> Result<Order> {
    let order = a.order();
    order.expect(b.order())?;
    order.expect(c.order())?;
    Ok(order)
}
