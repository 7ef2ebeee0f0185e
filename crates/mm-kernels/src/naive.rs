use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use mm_tensor::{Matrix, Order};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, warn};

use crate::device::{Device, KernelArgs};
use crate::error::{KernelError, Result};
use crate::program::{EntryPoint, Kernel};
use crate::strategy::{common_order, Multiplier};
use crate::work::WorkShape;

/// Worker `(i, j)` of the per-element kernel: the dot product of row `i` of
/// A and column `j` of B, or `None` for a worker outside the N×N output.
#[inline]
pub fn element_worker(n: usize, a: &[f32], b: &[f32], i: usize, j: usize) -> Option<f32> {
    if i >= n || j >= n {
        return None;
    }
    let mut tmp = 0.0f32;
    for k in 0..n {
        tmp += a[i * n + k] * b[k * n + j];
    }
    Some(tmp)
}

/// Run the per-element grid on `pool`, one task per cell of C.
///
/// Grid workers outside the N×N output own no cell and are never scheduled.
/// A worker that panics leaves its cell unwritten; the rest of the grid
/// still runs. Returns the number of failed workers.
pub(crate) fn run(
    pool: &ThreadPool,
    global: [usize; 2],
    a: &Matrix,
    b: &Matrix,
    c: &mut Matrix,
) -> usize {
    run_cells(pool, global, a, b, c, element_worker)
}

fn run_cells<W>(
    pool: &ThreadPool,
    global: [usize; 2],
    a: &Matrix,
    b: &Matrix,
    c: &mut Matrix,
    worker: W,
) -> usize
where
    W: Fn(usize, &[f32], &[f32], usize, usize) -> Option<f32> + Sync,
{
    let n = a.order().get();
    let idle = WorkShape::TwoD { global }.workers() - n * n;
    if idle > 0 {
        debug!(idle, "grid workers outside C");
    }
    let (a, b) = (a.as_slice(), b.as_slice());

    let failed: usize = pool.install(|| {
        c.as_mut_slice()
            .par_iter_mut()
            .enumerate()
            .map(|(idx, cell)| {
                let (i, j) = (idx / n, idx % n);
                match panic::catch_unwind(AssertUnwindSafe(|| worker(n, a, b, i, j))) {
                    Ok(Some(v)) => {
                        *cell = v;
                        0usize
                    }
                    Ok(None) => 0,
                    Err(_) => {
                        warn!(row = i, col = j, "worker failed, C({i},{j}) left unwritten");
                        1
                    }
                }
            })
            .sum()
    });

    if failed > 0 {
        warn!(failed, "per-element launch finished with failed workers");
    }
    failed
}

/// One worker per output element, reading A and B straight from shared
/// memory.
#[derive(Debug, Clone)]
pub struct NaivePartitionedMultiplier {
    device: Arc<Device>,
    kernel: Kernel,
}

impl NaivePartitionedMultiplier {
    /// # Errors
    /// Returns `InvalidArgument` if `kernel` is not bound to the
    /// per-element routine.
    pub fn new(device: Arc<Device>, kernel: Kernel) -> Result<Self> {
        if kernel.entry() != EntryPoint::Naive {
            return Err(KernelError::InvalidArgument {
                entry: kernel.name().to_string(),
                index: 0,
                reason: "kernel is not a per-element entry point".to_string(),
            });
        }
        Ok(NaivePartitionedMultiplier { device, kernel })
    }
}

impl Multiplier for NaivePartitionedMultiplier {
    fn name(&self) -> &str {
        "naive"
    }

    fn describe(&self, order: Order) -> String {
        format!(
            "{}, matrix mult, C(i,j) per work item, order {order}",
            self.device.info().name
        )
    }

    fn multiply(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<()> {
        let n = common_order(a, b, c)?.get();
        self.device
            .launch(&self.kernel, WorkShape::per_element(n), KernelArgs::new(a, b, c))
    }
}
