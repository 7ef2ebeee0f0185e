use std::fmt;

use mm_tensor::TensorError;
use thiserror::Error;

/// How a scratch slot broke the one-writer-per-epoch rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageProblem {
    DuplicateWriter,
    Unwritten,
}

impl fmt::Display for CoverageProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageProblem::DuplicateWriter => write!(f, "written twice"),
            CoverageProblem::Unwritten => write!(f, "never written"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("invalid device index {index}: {available} device(s) available (try '--list')")]
    InvalidDevice { index: usize, available: usize },
    #[error("invalid team size {team_size} for order {order}: must be in 1..={order}")]
    InvalidTeamSize { team_size: usize, order: usize },
    #[error("compile error in '{entry}': {reason}")]
    Compile { entry: String, reason: String },
    #[error("unknown entry point: {0}")]
    UnknownEntryPoint(String),
    #[error("invalid argument {index} for '{entry}': {reason}")]
    InvalidArgument {
        entry: String,
        index: usize,
        reason: String,
    },
    #[error("work shape {shape} does not fit kernel '{entry}': {reason}")]
    WorkShapeMismatch {
        entry: String,
        shape: String,
        reason: String,
    },
    #[error("scratch coverage violated in epoch {epoch}: slot {slot} {problem}")]
    CoverageViolation {
        epoch: usize,
        slot: usize,
        problem: CoverageProblem,
    },
    #[error("worker panicked in kernel '{0}'")]
    WorkerPanicked(String),
    #[error("thread pool: {0}")]
    ThreadPool(String),
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

impl KernelError {
    /// True for errors caused by how the run was configured rather than by
    /// the dispatch layer failing at runtime.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            KernelError::InvalidDevice { .. }
                | KernelError::InvalidTeamSize { .. }
                | KernelError::Tensor(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;
