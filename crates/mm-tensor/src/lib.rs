//! `mm-tensor` - Square matrices for matmul-bench.
//!
//! This crate provides:
//! - An `Order` type: the validated dimension N shared by A, B and C
//! - A row-major `Matrix` of f32
//! - `MatrixStore`, which owns A, B and C and fills them deterministically
//! - Tolerance-based verification of a computed product

pub mod error;
pub mod matrix;
pub mod order;
pub mod store;
pub mod verify;

// Re-export primary types at the crate root for convenience.
pub use error::{Result, TensorError};
pub use matrix::{zero, Matrix};
pub use order::Order;
pub use store::{Fill, MatrixStore};
pub use verify::{verify, Verification, TOL};
