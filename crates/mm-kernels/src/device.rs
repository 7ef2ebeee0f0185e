//! Host devices and kernel launch.

use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use mm_tensor::{Matrix, Order};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::error::{KernelError, Result};
use crate::program::{EntryPoint, Kernel, ParamKind};
use crate::tiled::ScratchSource;
use crate::work::WorkShape;
use crate::{naive, tiled};

/// What a device runs its workers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Rayon pool sized to the host's available parallelism.
    HostParallel,
    /// Rayon pool with a single thread.
    HostSerial,
}

/// Description of an available device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub kind: DeviceKind,
    /// Workers (or teams) the device runs concurrently.
    pub compute_units: usize,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} compute unit{})",
            self.index,
            self.name,
            self.compute_units,
            if self.compute_units == 1 { "" } else { "s" }
        )
    }
}

/// The set of devices a run can choose from.
#[derive(Debug, Clone)]
pub struct Platform {
    devices: Vec<DeviceInfo>,
}

impl Platform {
    /// Enumerate the host's devices.
    pub fn host() -> Self {
        let threads = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Platform {
            devices: vec![
                DeviceInfo {
                    index: 0,
                    name: "host-parallel".to_string(),
                    kind: DeviceKind::HostParallel,
                    compute_units: threads,
                },
                DeviceInfo {
                    index: 1,
                    name: "host-serial".to_string(),
                    kind: DeviceKind::HostSerial,
                    compute_units: 1,
                },
            ],
        }
    }

    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// Open the device at `index`.
    ///
    /// # Errors
    /// Returns `KernelError::InvalidDevice` if `index` is out of range, or
    /// `KernelError::ThreadPool` if the worker pool cannot be started.
    pub fn select(&self, index: usize) -> Result<Device> {
        let info = self
            .devices
            .get(index)
            .cloned()
            .ok_or(KernelError::InvalidDevice {
                index,
                available: self.devices.len(),
            })?;
        Device::open(info)
    }
}

/// Local (team-shared) memory requested for a launch, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSpace {
    pub bytes: usize,
}

impl LocalSpace {
    /// Room for `n` f32 values.
    pub fn floats(n: usize) -> Self {
        LocalSpace {
            bytes: n * std::mem::size_of::<f32>(),
        }
    }
}

/// Arguments for one launch, in declaration order.
#[derive(Debug)]
pub struct KernelArgs<'a> {
    pub order: Order,
    pub a: &'a Matrix,
    pub b: &'a Matrix,
    pub c: &'a mut Matrix,
    pub local: Option<LocalSpace>,
    /// Where the tiled routine reads B during accumulation.
    pub source: ScratchSource,
}

impl<'a> KernelArgs<'a> {
    pub fn new(a: &'a Matrix, b: &'a Matrix, c: &'a mut Matrix) -> Self {
        KernelArgs {
            order: a.order(),
            a,
            b,
            c,
            local: None,
            source: ScratchSource::default(),
        }
    }

    pub fn with_local(mut self, local: LocalSpace) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_source(mut self, source: ScratchSource) -> Self {
        self.source = source;
        self
    }
}

/// An opened device with its worker pool.
#[derive(Debug)]
pub struct Device {
    info: DeviceInfo,
    pool: ThreadPool,
}

impl Device {
    fn open(info: DeviceInfo) -> Result<Device> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(info.compute_units)
            .thread_name(|i| format!("mm-worker-{i}"))
            .build()
            .map_err(|e| KernelError::ThreadPool(e.to_string()))?;
        info!(device = %info.name, compute_units = info.compute_units, "opened device");
        Ok(Device { info, pool })
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Run `kernel` over `shape` and block until every worker has finished.
    ///
    /// # Errors
    /// - `InvalidArgument` when the arguments do not match the kernel's
    ///   declared parameters
    /// - `WorkShapeMismatch` when the shape does not cover the output
    /// - `InvalidTeamSize` for a team-based launch with an unusable team size
    /// - `CoverageViolation` / `WorkerPanicked` from the workers themselves
    pub fn launch(&self, kernel: &Kernel, shape: WorkShape, args: KernelArgs<'_>) -> Result<()> {
        check_args(kernel, &args)?;
        let n = args.order.get();
        debug!(kernel = kernel.name(), %shape, order = n, "launching");

        let outcome = match (kernel.entry(), shape) {
            (EntryPoint::Naive, WorkShape::TwoD { global }) => {
                if global[0] < n || global[1] < n {
                    return Err(shape_mismatch(kernel, shape, "grid does not cover C"));
                }
                let KernelArgs { a, b, c, .. } = args;
                let pool = &self.pool;
                // failed workers only leave their own cell unwritten, which
                // verification reports
                panic::catch_unwind(AssertUnwindSafe(|| {
                    naive::run(pool, global, a, b, c);
                    Ok(())
                }))
            }
            (EntryPoint::RowTiled, WorkShape::OneD { global, local }) => {
                if local == 0 || local > n {
                    return Err(KernelError::InvalidTeamSize {
                        team_size: local,
                        order: n,
                    });
                }
                if global < n {
                    return Err(shape_mismatch(kernel, shape, "fewer workers than rows"));
                }
                let KernelArgs { a, b, c, source, .. } = args;
                let pool = &self.pool;
                panic::catch_unwind(AssertUnwindSafe(|| {
                    tiled::run(pool, local, source, a, b, c)
                }))
            }
            (EntryPoint::Naive, _) => {
                return Err(shape_mismatch(kernel, shape, "expected a 2-D grid"))
            }
            (EntryPoint::RowTiled, _) => {
                return Err(shape_mismatch(kernel, shape, "expected a 1-D shape with teams"))
            }
        };

        outcome.unwrap_or_else(|_| Err(KernelError::WorkerPanicked(kernel.name().to_string())))
    }
}

fn shape_mismatch(kernel: &Kernel, shape: WorkShape, reason: &str) -> KernelError {
    KernelError::WorkShapeMismatch {
        entry: kernel.name().to_string(),
        shape: shape.to_string(),
        reason: reason.to_string(),
    }
}

fn invalid_arg(kernel: &Kernel, index: usize, reason: impl Into<String>) -> KernelError {
    KernelError::InvalidArgument {
        entry: kernel.name().to_string(),
        index,
        reason: reason.into(),
    }
}

fn check_args(kernel: &Kernel, args: &KernelArgs<'_>) -> Result<()> {
    let n = args.order;
    let mut matrices = [args.a.order(), args.b.order(), args.c.order()].into_iter();
    let mut local_seen = false;

    for (index, param) in kernel.params().iter().enumerate() {
        match param.kind {
            ParamKind::Order => {}
            ParamKind::GlobalRead | ParamKind::GlobalWrite => {
                let got = matrices
                    .next()
                    .ok_or_else(|| invalid_arg(kernel, index, "too many buffer parameters"))?;
                if got != n {
                    return Err(invalid_arg(
                        kernel,
                        index,
                        format!("{}: order {got} does not match N = {n}", param.name),
                    ));
                }
            }
            ParamKind::Local => {
                local_seen = true;
                let needed = LocalSpace::floats(n.get()).bytes;
                match args.local {
                    None => {
                        return Err(invalid_arg(
                            kernel,
                            index,
                            format!("{}: local memory argument missing", param.name),
                        ))
                    }
                    Some(space) if space.bytes < needed => {
                        return Err(invalid_arg(
                            kernel,
                            index,
                            format!(
                                "{}: {} bytes of local memory, need {needed}",
                                param.name, space.bytes
                            ),
                        ))
                    }
                    Some(_) => {}
                }
            }
        }
    }

    if args.local.is_some() && !local_seen {
        return Err(invalid_arg(
            kernel,
            kernel.params().len(),
            "kernel takes no local memory argument",
        ));
    }
    Ok(())
}
