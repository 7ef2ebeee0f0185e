use crate::error::{Result, TensorError};
use crate::order::Order;

/// A dense N×N matrix of `f32` values.
///
/// Holds contiguous, row-major data; `data.len() == order.numel()` always.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f32>,
    order: Order,
}

impl Matrix {
    /// Create a matrix from row-major data.
    ///
    /// # Errors
    /// Returns `TensorError::LengthMismatch` if `data.len() != N*N`.
    pub fn new(data: Vec<f32>, order: Order) -> Result<Self> {
        if data.len() != order.numel() {
            return Err(TensorError::LengthMismatch {
                order: order.get(),
                expected: order.numel(),
                got: data.len(),
            });
        }
        Ok(Matrix { data, order })
    }

    /// Create a zero-filled matrix.
    pub fn zeros(order: Order) -> Self {
        Matrix {
            data: vec![0.0; order.numel()],
            order,
        }
    }

    /// Create the identity matrix.
    pub fn identity(order: Order) -> Self {
        Self::from_fn(order, |i, j| if i == j { 1.0 } else { 0.0 })
    }

    /// Create a matrix whose element `(i, j)` is `f(i, j)`.
    pub fn from_fn(order: Order, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let n = order.get();
        let data = (0..order.numel()).map(|idx| f(idx / n, idx % n)).collect();
        Matrix { data, order }
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Element at `(row, col)`.
    ///
    /// # Panics
    /// Panics if either index is out of range.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[self.order.index(row, col)]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Overwrite every element with `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Overwrite every element with `f(i, j)`.
    pub fn fill_with(&mut self, mut f: impl FnMut(usize, usize) -> f32) {
        let n = self.order.get();
        for (idx, v) in self.data.iter_mut().enumerate() {
            *v = f(idx / n, idx % n);
        }
    }
}

/// Overwrite every element of `c` with 0.
pub fn zero(c: &mut Matrix) {
    c.fill(0.0);
}
