use crate::error::{Result, TensorError};
use std::fmt;

/// The order N of a square matrix.
///
/// Every matrix in a benchmark run shares one `Order`; constructing one
/// rejects zero so downstream code can index `0..n` without further checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Order(usize);

impl Order {
    /// Create a validated order.
    ///
    /// # Errors
    /// Returns `TensorError::InvalidShape` if `n == 0`.
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(TensorError::InvalidShape(
                "matrix order must be a positive integer".to_string(),
            ));
        }
        Ok(Order(n))
    }

    /// The dimension N.
    pub fn get(self) -> usize {
        self.0
    }

    /// Total number of elements, N×N.
    pub fn numel(self) -> usize {
        self.0 * self.0
    }

    /// Row-major flat index of `(row, col)`.
    #[inline]
    pub fn index(self, row: usize, col: usize) -> usize {
        row * self.0 + col
    }

    /// Floating-point operations implied by one N×N×N product (one multiply
    /// and one add per inner-loop step).
    pub fn flops(self) -> f64 {
        let n = self.0 as f64;
        2.0 * n * n * n
    }

    /// Checks that `other` matches this order.
    pub fn expect(self, other: Order) -> Result<()> {
        if self != other {
            return Err(TensorError::OrderMismatch {
                expected: self.0,
                got: other.0,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<usize> for Order {
    type Error = TensorError;

    fn try_from(n: usize) -> Result<Self> {
        Order::new(n)
    }
}
