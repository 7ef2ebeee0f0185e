//! `mm-kernels` - Matrix multiplication strategies for matmul-bench.
//!
//! This crate provides:
//! - A `Multiplier` trait shared by every strategy
//! - `ReferenceMultiplier`, the sequential correctness oracle
//! - `NaivePartitionedMultiplier`, one worker per output element
//! - `TiledScratchMultiplier`, one worker per output row with a private row
//!   of A and a team-shared staging buffer for B
//! - A host dispatch layer: `Platform`/`Device` discovery, `Program`
//!   compilation of kernel source, and `Device::launch`

pub mod device;
pub mod error;
pub mod naive;
pub mod program;
pub mod reference;
pub mod scratch;
pub mod strategy;
pub mod tiled;
pub mod work;

pub use device::{Device, DeviceInfo, DeviceKind, KernelArgs, LocalSpace, Platform};
pub use error::{CoverageProblem, KernelError, Result};
pub use naive::NaivePartitionedMultiplier;
pub use program::{Kernel, Program, KERNEL_SOURCE, NAIVE_ENTRY, TILED_ENTRY};
pub use reference::{reference_product, ReferenceMultiplier};
pub use scratch::{strided_slots, PrivateRow, ScratchBuffer};
pub use strategy::Multiplier;
pub use tiled::{default_team_size, ScratchSource, TiledScratchMultiplier};
pub use work::WorkShape;
