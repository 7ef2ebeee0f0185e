use mm_tensor::{Matrix, Order};

use crate::error::Result;
use crate::strategy::{common_order, Multiplier};

/// Sequential dot-product multiplication on the calling thread.
///
/// The correctness oracle for every parallel strategy.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMultiplier;

impl ReferenceMultiplier {
    pub fn new() -> Self {
        ReferenceMultiplier
    }
}

impl Multiplier for ReferenceMultiplier {
    fn name(&self) -> &str {
        "reference"
    }

    fn describe(&self, order: Order) -> String {
        format!("Sequential, matrix mult (dot prod), order {order} on host CPU")
    }

    fn multiply(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<()> {
        let n = common_order(a, b, c)?.get();
        let (a, b) = (a.as_slice(), b.as_slice());
        let c = c.as_mut_slice();

        for i in 0..n {
            for j in 0..n {
                let mut sum = 0.0f32;
                for k in 0..n {
                    sum += a[i * n + k] * b[k * n + j];
                }
                c[i * n + j] = sum;
            }
        }
        Ok(())
    }
}

/// Compute A × B into a fresh matrix with [`ReferenceMultiplier`].
pub fn reference_product(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    let mut c = Matrix::zeros(a.order());
    ReferenceMultiplier.multiply(a, b, &mut c)?;
    Ok(c)
}
