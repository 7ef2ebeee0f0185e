//! Row-per-worker multiplication with a private row of A and a team-shared
//! staging buffer for the active column of B.
//!
//! Teams run concurrently on the device pool. The members of one team each
//! get a scoped thread of their own, since they block on a shared barrier
//! and must all be running at once for it to release.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Barrier, PoisonError, RwLock};
use std::thread;

use mm_tensor::{Matrix, Order};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::debug;

use crate::device::{Device, KernelArgs, LocalSpace};
use crate::error::{KernelError, Result};
use crate::program::{EntryPoint, Kernel, TILED_ENTRY};
use crate::scratch::{strided_slots, PrivateRow, ScratchBuffer};
use crate::strategy::{common_order, Multiplier};
use crate::work::WorkShape;

/// Where a worker reads column `j` of B from when accumulating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScratchSource {
    /// Re-read B from global memory; staging only warms the team's buffer.
    #[default]
    Global,
    /// Read the values the team staged into its scratch buffer.
    Local,
}

/// Team size used when none is configured: N/16, at least 1.
pub fn default_team_size(n: usize) -> usize {
    (n / 16).max(1)
}

/// Run the tiled kernel on `pool` with teams of `nloc` members.
///
/// C is handed out one team's block of rows at a time; the last team is
/// padded with members that own no row.
pub(crate) fn run(
    pool: &ThreadPool,
    nloc: usize,
    source: ScratchSource,
    a: &Matrix,
    b: &Matrix,
    c: &mut Matrix,
) -> Result<()> {
    let n = a.order().get();
    let padding = WorkShape::per_row(n, nloc).workers() - n;
    if padding > 0 {
        debug!(padding, "padding last team");
    }
    let (a, b) = (a.as_slice(), b.as_slice());

    pool.install(|| {
        c.as_mut_slice()
            .par_chunks_mut(nloc * n)
            .enumerate()
            .try_for_each(|(team, rows)| run_team(team, nloc, n, source, a, b, rows))
    })
}

fn run_team(
    team: usize,
    nloc: usize,
    n: usize,
    source: ScratchSource,
    a: &[f32],
    b: &[f32],
    rows: &mut [f32],
) -> Result<()> {
    let scratch = ScratchBuffer::checkout(n);
    let barrier = Barrier::new(nloc);
    // held while members are spawned; true once the whole team is running
    let start = RwLock::new(false);

    let mut outputs: Vec<Option<&mut [f32]>> = rows.chunks_mut(n).map(Some).collect();
    outputs.resize_with(nloc, || None);

    thread::scope(|s| {
        let mut gate = start.write().unwrap_or_else(PoisonError::into_inner);
        let mut handles = Vec::with_capacity(nloc);
        let mut spawn_err = None;

        for (loc, out) in outputs.into_iter().enumerate() {
            let member = TeamMember {
                loc,
                nloc,
                row: team * nloc + loc,
                n,
                scratch: &scratch,
                barrier: &barrier,
            };
            let start = &start;
            let spawned = thread::Builder::new()
                .name(format!("mm-team-{team}-{loc}"))
                .spawn_scoped(s, move || {
                    if !*start.read().unwrap_or_else(PoisonError::into_inner) {
                        return Ok(());
                    }
                    member.run(a, b, out, source)
                });
            match spawned {
                Ok(h) => handles.push(h),
                Err(e) => {
                    spawn_err = Some(e);
                    break;
                }
            }
        }

        // members only reach the barrier once every one of them exists
        *gate = spawn_err.is_none();
        drop(gate);

        let results: Vec<Result<()>> = handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(KernelError::WorkerPanicked(TILED_ENTRY.to_string())))
            })
            .collect();

        if let Some(e) = spawn_err {
            return Err(KernelError::ThreadPool(format!(
                "failed to start member of team {team}: {e}"
            )));
        }
        results.into_iter().collect()
    })
}

/// One worker of a team.
struct TeamMember<'t> {
    loc: usize,
    nloc: usize,
    /// Output row, `>= n` for padding members.
    row: usize,
    n: usize,
    scratch: &'t ScratchBuffer,
    barrier: &'t Barrier,
}

impl TeamMember<'_> {
    /// Every member waits on the barrier exactly twice per column, errors
    /// or not; leaving early would strand the rest of the team.
    fn run(
        &self,
        a: &[f32],
        b: &[f32],
        mut out: Option<&mut [f32]>,
        source: ScratchSource,
    ) -> Result<()> {
        let n = self.n;
        let private = out
            .as_ref()
            .map(|_| PrivateRow::load(&a[self.row * n..(self.row + 1) * n]));
        let mut err = None;

        for j in 0..n {
            guarded(&mut err, || {
                for k in strided_slots(self.loc, self.nloc, n) {
                    self.scratch.stage(j, k, b[k * n + j])?;
                }
                Ok(())
            });

            self.barrier.wait();

            if self.loc == 0 {
                guarded(&mut err, || self.scratch.check_epoch(j));
            }
            if let (Some(row), Some(private)) = (out.as_deref_mut(), private.as_ref()) {
                guarded(&mut err, || {
                    let mut tmp = 0.0f32;
                    match source {
                        ScratchSource::Global => {
                            for k in 0..n {
                                tmp += private[k] * b[k * n + j];
                            }
                        }
                        ScratchSource::Local => {
                            for k in 0..n {
                                tmp += private[k] * self.scratch.read(k);
                            }
                        }
                    }
                    row[j] += tmp;
                    Ok(())
                });
            }

            // no member restages until everyone is done reading this column
            self.barrier.wait();
        }

        err.map_or(Ok(()), Err)
    }
}

/// Run `f` unless an error is already recorded, turning a panic into
/// `WorkerPanicked` so the caller can keep up with its team.
fn guarded(err: &mut Option<KernelError>, f: impl FnOnce() -> Result<()>) {
    if err.is_some() {
        return;
    }
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => *err = Some(e),
        Err(_) => *err = Some(KernelError::WorkerPanicked(TILED_ENTRY.to_string())),
    }
}

/// One worker per output row; A's row kept private, B's active column
/// staged cooperatively by the worker's team.
#[derive(Debug, Clone)]
pub struct TiledScratchMultiplier {
    device: Arc<Device>,
    kernel: Kernel,
    team_size: Option<usize>,
    source: ScratchSource,
}

impl TiledScratchMultiplier {
    /// # Errors
    /// Returns `InvalidArgument` if `kernel` is not bound to the row-tiled
    /// routine.
    pub fn new(device: Arc<Device>, kernel: Kernel) -> Result<Self> {
        if kernel.entry() != EntryPoint::RowTiled {
            return Err(KernelError::InvalidArgument {
                entry: kernel.name().to_string(),
                index: 0,
                reason: "kernel is not a row-tiled entry point".to_string(),
            });
        }
        Ok(TiledScratchMultiplier {
            device,
            kernel,
            team_size: None,
            source: ScratchSource::default(),
        })
    }

    /// Fix the team size instead of deriving it from the order.
    pub fn with_team_size(mut self, team_size: usize) -> Self {
        self.team_size = Some(team_size);
        self
    }

    pub fn with_source(mut self, source: ScratchSource) -> Self {
        self.source = source;
        self
    }

    /// Team size a multiply of order `n` will use.
    pub fn team_size_for(&self, n: usize) -> usize {
        self.team_size.unwrap_or_else(|| default_team_size(n))
    }
}

impl Multiplier for TiledScratchMultiplier {
    fn name(&self) -> &str {
        "tiled"
    }

    fn describe(&self, order: Order) -> String {
        format!(
            "{}, optimised memory matrix mult, C row per work item, A row private, B local, order {order}, team size {}",
            self.device.info().name,
            self.team_size_for(order.get())
        )
    }

    fn multiply(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<()> {
        let n = common_order(a, b, c)?.get();
        let args = KernelArgs::new(a, b, c)
            .with_local(LocalSpace::floats(n))
            .with_source(self.source);
        self.device.launch(
            &self.kernel,
            WorkShape::per_row(n, self.team_size_for(n)),
            args,
        )
    }
}
