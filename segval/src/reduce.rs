//! Cross-rank reduction of per-batch area triples.
//!
//! Every rank computes a [`ClassAreas`] triple per batch and all ranks
//! exchange them through an [`AreaGather`] before folding into their
//! running accumulator. The gather is the only coordination point in
//! the whole run: every rank must reach it before any proceeds, and a
//! stalled rank stalls all of them (there is no timeout).

use std::sync::{Arc, Barrier, Mutex};

use segval_metric::ClassAreas;

use crate::error::GatherError;

/// Rank-ordered all-gather of per-batch area triples.
pub trait AreaGather {
    /// Number of participating ranks.
    fn num_ranks(&self) -> usize;

    /// This process's rank id, in `[0, num_ranks)`.
    fn rank(&self) -> usize;

    /// Exchanges `local` with every rank; the result holds one entry
    /// per rank, ordered by rank id.
    ///
    /// # Errors
    ///
    /// [`GatherError::Communication`] when the transport fails. Fatal;
    /// callers do not retry.
    fn all_gather(&self, local: &ClassAreas) -> Result<Vec<ClassAreas>, GatherError>;
}

/// Identity collective for single-process runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalGather;

impl AreaGather for LocalGather {
    fn num_ranks(&self) -> usize {
        1
    }

    fn rank(&self) -> usize {
        0
    }

    fn all_gather(&self, local: &ClassAreas) -> Result<Vec<ClassAreas>, GatherError> {
        Ok(vec![local.clone()])
    }
}

/// Thread-backed collective: one handle per rank, sharing a barrier
/// and a slot table.
///
/// This is the in-repo reference implementation of [`AreaGather`] for
/// thread-per-rank evaluation; multi-process transports implement the
/// same trait downstream.
pub struct BarrierGather {
    shared: Arc<GatherShared>,
    rank: usize,
    num_ranks: usize,
}

struct GatherShared {
    barrier: Barrier,
    slots: Mutex<Vec<Option<ClassAreas>>>,
}

impl BarrierGather {
    /// Creates one connected handle per rank.
    pub fn create(num_ranks: usize) -> Vec<Self> {
        let shared = Arc::new(GatherShared {
            barrier: Barrier::new(num_ranks),
            slots: Mutex::new(vec![None; num_ranks]),
        });
        (0..num_ranks)
            .map(|rank| Self {
                shared: Arc::clone(&shared),
                rank,
                num_ranks,
            })
            .collect()
    }
}

impl AreaGather for BarrierGather {
    fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn all_gather(&self, local: &ClassAreas) -> Result<Vec<ClassAreas>, GatherError> {
        {
            let mut slots = self
                .shared
                .slots
                .lock()
                .map_err(|_| GatherError::Communication {
                    reason: "gather state poisoned".to_owned(),
                })?;
            slots[self.rank] = Some(local.clone());
        }
        // All ranks have deposited their triple.
        self.shared.barrier.wait();

        let gathered = {
            let slots = self
                .shared
                .slots
                .lock()
                .map_err(|_| GatherError::Communication {
                    reason: "gather state poisoned".to_owned(),
                })?;
            slots
                .iter()
                .enumerate()
                .map(|(rank, slot)| {
                    slot.clone().ok_or_else(|| GatherError::Communication {
                        reason: format!("rank {rank} missing from gather"),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        // All ranks have read; the next round may overwrite the slots.
        self.shared.barrier.wait();

        Ok(gathered)
    }
}

/// Folds one batch into the running accumulator, across ranks.
///
/// Single-rank gathers skip the exchange entirely. Otherwise the
/// per-batch triples of all ranks are gathered in rank order, and —
/// when the distributed sampler padded the final batch with duplicated
/// samples to equalize shard sizes — truncated to
/// `valid = total_samples - iteration * num_ranks` entries before
/// being summed, so padded duplicates are never double-counted.
pub fn accumulate_gathered<G: AreaGather>(
    gather: &G,
    running: &mut ClassAreas,
    batch: &ClassAreas,
    iteration: usize,
    total_samples: usize,
) -> Result<(), GatherError> {
    let num_ranks = gather.num_ranks();
    if num_ranks <= 1 {
        running.accumulate(batch);
        return Ok(());
    }

    let mut gathered = gather.all_gather(batch)?;
    if gathered.len() != num_ranks {
        return Err(GatherError::WrongWorldSize {
            got: gathered.len(),
            expected: num_ranks,
        });
    }

    if (iteration + 1) * num_ranks > total_samples {
        gathered.truncate(total_samples.saturating_sub(iteration * num_ranks));
    }

    for part in &gathered {
        running.accumulate(part);
    }
    Ok(())
}
