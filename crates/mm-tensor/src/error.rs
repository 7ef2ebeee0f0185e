use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error("order mismatch: expected {expected}x{expected}, got {got}x{got}")]
    OrderMismatch { expected: usize, got: usize },
    #[error("length mismatch: order {order} needs {expected} elements, got {got}")]
    LengthMismatch {
        order: usize,
        expected: usize,
        got: usize,
    },
}

pub type Result<T> = std::result::Result<T, TensorError>;
