//! Per-worker and per-team buffers used by the tiled strategy.
//!
//! A [`PrivateRow`] is owned by exactly one worker. A [`ScratchBuffer`] is
//! shared by the members of one team and is only ever touched between the
//! team's barriers: every slot is written once per epoch, then read.

use std::ops::Deref;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::error::{CoverageProblem, KernelError, Result};

/// A worker's private copy of one row of A.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivateRow(Vec<f32>);

impl PrivateRow {
    pub fn load(row: &[f32]) -> Self {
        PrivateRow(row.to_vec())
    }
}

impl Deref for PrivateRow {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

/// Slots written by team member `loc` of a team of `nloc` in one epoch:
/// `loc, loc + nloc, loc + 2*nloc, ...` below `n`.
///
/// For a fixed `nloc > 0` the slot sets of members `0..nloc` partition
/// `0..n`, whether or not `nloc` divides `n`.
pub fn strided_slots(loc: usize, nloc: usize, n: usize) -> impl Iterator<Item = usize> {
    debug_assert!(nloc > 0);
    (loc..n).step_by(nloc.max(1))
}

/// Team-shared staging buffer of `n` f32 slots.
///
/// Values are stored as atomic bit patterns so members can write disjoint
/// slots through a shared reference; the team barrier orders those writes
/// before any read. Each slot also records the epoch that last wrote it.
#[derive(Debug)]
pub struct ScratchBuffer {
    values: Vec<AtomicU32>,
    // epoch + 1 of the last write, 0 = never written
    stamps: Vec<AtomicUsize>,
}

impl ScratchBuffer {
    /// Check out a buffer for one team. It is released when dropped at the
    /// end of the team's launch.
    pub fn checkout(n: usize) -> Self {
        ScratchBuffer {
            values: (0..n).map(|_| AtomicU32::new(0)).collect(),
            stamps: (0..n).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    /// Write `value` into `slot` for `epoch`.
    ///
    /// # Errors
    /// Returns `CoverageViolation` if the slot was already written this epoch.
    pub fn stage(&self, epoch: usize, slot: usize, value: f32) -> Result<()> {
        let prev = self.stamps[slot].swap(epoch + 1, Ordering::Relaxed);
        if prev == epoch + 1 {
            return Err(KernelError::CoverageViolation {
                epoch,
                slot,
                problem: CoverageProblem::DuplicateWriter,
            });
        }
        self.values[slot].store(value.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Read `slot`. Only meaningful after the staging barrier.
    #[inline]
    pub fn read(&self, slot: usize) -> f32 {
        f32::from_bits(self.values[slot].load(Ordering::Relaxed))
    }

    /// Checks that every slot was written during `epoch`.
    ///
    /// # Errors
    /// Returns `CoverageViolation` naming the first unwritten slot.
    pub fn check_epoch(&self, epoch: usize) -> Result<()> {
        match self
            .stamps
            .iter()
            .position(|s| s.load(Ordering::Relaxed) != epoch + 1)
        {
            Some(slot) => Err(KernelError::CoverageViolation {
                epoch,
                slot,
                problem: CoverageProblem::Unwritten,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_strided_slots_partition() {
        for n in 1..=40 {
            for nloc in 1..=n {
                let mut hits = vec![0usize; n];
                for loc in 0..nloc {
                    for k in strided_slots(loc, nloc, n) {
                        hits[k] += 1;
                    }
                }
                assert!(
                    hits.iter().all(|&h| h == 1),
                    "n={n} nloc={nloc}: {hits:?}"
                );
            }
        }
    }

    #[test]
    fn test_strided_slots_example() {
        let slots: Vec<usize> = strided_slots(1, 4, 10).collect();
        assert_eq!(slots, vec![1, 5, 9]);
        // padding member past n stages nothing
        assert_eq!(strided_slots(12, 16, 10).count(), 0);
    }

    #[test]
    fn test_private_row() {
        let row = PrivateRow::load(&[1.0, 2.0, 3.0]);
        assert_eq!(row.len(), 3);
        assert_eq!(&row[..], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_stage_and_read() {
        let s = ScratchBuffer::checkout(3);
        for k in 0..3 {
            s.stage(0, k, k as f32 * 1.5).unwrap();
        }
        s.check_epoch(0).unwrap();
        assert_eq!(s.read(2), 3.0);
    }

    #[test]
    fn test_duplicate_writer_detected() {
        let s = ScratchBuffer::checkout(4);
        s.stage(2, 1, 1.0).unwrap();
        let err = s.stage(2, 1, 1.0).unwrap_err();
        assert_eq!(
            err,
            KernelError::CoverageViolation {
                epoch: 2,
                slot: 1,
                problem: CoverageProblem::DuplicateWriter
            }
        );
    }

    #[test]
    fn test_unwritten_slot_detected() {
        let s = ScratchBuffer::checkout(4);
        for k in [0, 1, 3] {
            s.stage(0, k, 0.0).unwrap();
        }
        let err = s.check_epoch(0).unwrap_err();
        assert_eq!(
            err,
            KernelError::CoverageViolation {
                epoch: 0,
                slot: 2,
                problem: CoverageProblem::Unwritten
            }
        );
        // a slot written in an earlier epoch does not count for a later one
        s.stage(0, 2, 0.0).unwrap();
        s.check_epoch(0).unwrap();
        assert!(s.check_epoch(1).is_err());
    }

    #[test]
    fn test_team_staging_covers_every_epoch() {
        let n = 16;
        let nloc = 4;
        let scratch = ScratchBuffer::checkout(n);
        let barrier = Barrier::new(nloc);

        thread::scope(|s| {
            for loc in 0..nloc {
                let (scratch, barrier) = (&scratch, &barrier);
                s.spawn(move || {
                    for epoch in 0..n {
                        for k in strided_slots(loc, nloc, n) {
                            scratch.stage(epoch, k, (epoch * n + k) as f32).unwrap();
                        }
                        barrier.wait();
                        scratch.check_epoch(epoch).unwrap();
                        for k in 0..n {
                            assert_eq!(scratch.read(k), (epoch * n + k) as f32);
                        }
                        barrier.wait();
                    }
                });
            }
        });
    }
}
