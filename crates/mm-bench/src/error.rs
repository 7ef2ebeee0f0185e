use std::io;

use mm_kernels::KernelError;
use mm_tensor::TensorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidConfig {
        key: String,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error(transparent)]
    Tensor(#[from] TensorError),
    #[error("report output: {0}")]
    Io(#[from] io::Error),
}

impl BenchError {
    /// True for errors caused by how the run was configured.
    pub fn is_configuration(&self) -> bool {
        match self {
            BenchError::InvalidConfig { .. } | BenchError::Tensor(_) => true,
            BenchError::Kernel(e) => e.is_configuration(),
            BenchError::Io(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
