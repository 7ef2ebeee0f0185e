use tracing::debug;

use crate::error::Result;
use crate::matrix::{self, Matrix};
use crate::order::Order;

/// Constant value of A under [`Fill::Constant`] defaults.
pub const AVAL: f32 = 3.0;
/// Constant value of B under [`Fill::Constant`] defaults.
pub const BVAL: f32 = 5.0;

/// How A, B and C are initialized.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Fill {
    /// Row/column-dependent values, exact in f32 for orders up to 4096:
    ///
    /// - `A[i,j] = 1 + ((i + j) % 5) * 0.5`
    /// - `B[i,j] = 1 + ((3i + j) % 7) * 0.25`
    /// - `C[i,j] = -(i + j)`
    #[default]
    Pattern,
    /// Every element of A is `a`, every element of B is `b`, C is zero.
    /// The product is known analytically: each element equals `N * a * b`.
    Constant { a: f32, b: f32 },
}

impl Fill {
    /// The constant fill of the classic driver program.
    pub fn classic() -> Self {
        Fill::Constant { a: AVAL, b: BVAL }
    }

    fn a(self, i: usize, j: usize) -> f32 {
        match self {
            Fill::Pattern => 1.0 + ((i + j) % 5) as f32 * 0.5,
            Fill::Constant { a, .. } => a,
        }
    }

    fn b(self, i: usize, j: usize) -> f32 {
        match self {
            Fill::Pattern => 1.0 + ((3 * i + j) % 7) as f32 * 0.25,
            Fill::Constant { b, .. } => b,
        }
    }

    fn c(self, i: usize, j: usize) -> f32 {
        match self {
            Fill::Pattern => -((i + j) as f32),
            Fill::Constant { .. } => 0.0,
        }
    }

    /// The exact product, when it is known without computing it.
    pub fn analytic_product(self, order: Order) -> Option<Matrix> {
        match self {
            Fill::Pattern => None,
            Fill::Constant { a, b } => {
                let mut m = Matrix::zeros(order);
                m.fill(order.get() as f32 * a * b);
                Some(m)
            }
        }
    }
}

/// Owns the three matrices of a benchmark run.
#[derive(Debug, Clone)]
pub struct MatrixStore {
    pub a: Matrix,
    pub b: Matrix,
    pub c: Matrix,
    fill: Fill,
}

impl MatrixStore {
    /// Allocate and fill A, B and C with the default pattern.
    ///
    /// # Errors
    /// Returns `TensorError::InvalidShape` if `n == 0`.
    pub fn initialize(n: usize) -> Result<Self> {
        Self::with_fill(n, Fill::default())
    }

    /// Allocate and fill A, B and C with `fill`.
    pub fn with_fill(n: usize, fill: Fill) -> Result<Self> {
        let order = Order::new(n)?;
        let mut store = MatrixStore {
            a: Matrix::zeros(order),
            b: Matrix::zeros(order),
            c: Matrix::zeros(order),
            fill,
        };
        store.reinitialize();
        Ok(store)
    }

    pub fn order(&self) -> Order {
        self.a.order()
    }

    pub fn fill(&self) -> Fill {
        self.fill
    }

    /// Refill all three matrices from the store's fill.
    pub fn reinitialize(&mut self) {
        let fill = self.fill;
        debug!(order = %self.order(), ?fill, "initializing matrices");
        self.a.fill_with(|i, j| fill.a(i, j));
        self.b.fill_with(|i, j| fill.b(i, j));
        self.c.fill_with(|i, j| fill.c(i, j));
    }

    /// Overwrite every element of C with 0.
    pub fn zero_c(&mut self) {
        matrix::zero(&mut self.c);
    }
}
