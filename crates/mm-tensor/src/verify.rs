use approx::relative_eq;

use crate::error::Result;
use crate::matrix::Matrix;

/// Default per-element relative tolerance.
pub const TOL: f32 = 1e-3;

/// Outcome of comparing a computed matrix against the expected product.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    /// Number of elements outside the tolerance.
    pub mismatches: usize,
    /// Largest relative error seen (infinite when a value is not finite).
    pub max_rel_error: f32,
    /// Flat index of the first element outside the tolerance.
    pub first_bad_index: Option<usize>,
    pub tolerance: f32,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

fn relative_error(actual: f32, expected: f32) -> f32 {
    if !actual.is_finite() || !expected.is_finite() {
        return f32::INFINITY;
    }
    let diff = (actual - expected).abs();
    let largest = actual.abs().max(expected.abs());
    if largest == 0.0 {
        0.0
    } else {
        diff / largest
    }
}

/// Compare `actual` against `expected` element by element.
///
/// An element passes when it is within `tolerance` of the expected value
/// relative to the larger magnitude of the two. Accumulation order differs
/// across strategies, so exact equality is never required.
///
/// # Errors
/// Returns `TensorError::OrderMismatch` if the matrices differ in order.
pub fn verify(actual: &Matrix, expected: &Matrix, tolerance: f32) -> Result<Verification> {
    expected.order().expect(actual.order())?;

    let mut report = Verification {
        mismatches: 0,
        max_rel_error: 0.0,
        first_bad_index: None,
        tolerance,
    };

    for (idx, (&x, &y)) in actual
        .as_slice()
        .iter()
        .zip(expected.as_slice())
        .enumerate()
    {
        let err = relative_error(x, y);
        if err > report.max_rel_error {
            report.max_rel_error = err;
        }
        if !relative_eq!(x, y, epsilon = f32::EPSILON, max_relative = tolerance) {
            report.mismatches += 1;
            report.first_bad_index.get_or_insert(idx);
        }
    }

    Ok(report)
}
