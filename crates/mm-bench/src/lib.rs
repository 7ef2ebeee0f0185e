//! `mm-bench` - Benchmark harness for matmul-bench.
//!
//! Runs each multiplication strategy a fixed number of times over one set of
//! deterministically filled matrices, timing every repetition and checking
//! its output against the reference product.

pub mod config;
pub mod error;
pub mod harness;
pub mod report;

pub use config::BenchConfig;
pub use error::{BenchError, Result};
pub use harness::{mflops, BenchmarkHarness, HarnessSummary, RunResult};
pub use report::{ConsoleReport, Report};
