//! Batch refill: restore captured loot tables to their physical blocks,
//! sliced across ticks.

use tracing::{debug, info};

use loot_rs_world::{LocationKey, LootTableId, WorldHost};

/// Progress made by one tick slice of a refill job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefillProgress {
    /// Whether the job consumed its final entry this slice.
    pub finished: bool,
    /// Cumulative count of successfully refilled containers.
    pub refilled: usize,
    /// Cumulative count of entries skipped (unloaded chunk or the block no
    /// longer resolves to a container).
    pub skipped: usize,
}

/// A refill over a fixed snapshot of managed locations.
///
/// The snapshot is taken (and the registry cleared) before the job is
/// constructed, so containers captured after the refill started are
/// untouched. Each slice writes at most `budget` loot tables back; skipped
/// entries do not count against the budget and are never retried.
#[derive(Debug)]
pub struct RefillJob {
    entries: std::vec::IntoIter<(LocationKey, LootTableId)>,
    budget: usize,
    refilled: usize,
    skipped: usize,
}

impl RefillJob {
    pub fn new(entries: Vec<(LocationKey, LootTableId)>, budget: usize) -> Self {
        Self {
            entries: entries.into_iter(),
            budget: budget.max(1),
            refilled: 0,
            skipped: 0,
        }
    }

    /// Total entries in the snapshot, including any already processed.
    pub fn total(&self) -> usize {
        self.entries.len() + self.refilled + self.skipped
    }

    /// Run one tick slice. Stops after `budget` successful refills or when
    /// the snapshot is exhausted, whichever comes first.
    pub fn run_slice(&mut self, world: &dyn WorldHost) -> RefillProgress {
        let mut written = 0;
        while written < self.budget {
            let Some((loc, table)) = self.entries.next() else {
                break;
            };

            if !world.is_chunk_loaded(&loc) {
                debug!(location = %loc, "chunk unloaded, skipping refill");
                self.skipped += 1;
                continue;
            }
            if !world.set_block_loot_table(&loc, Some(table)) {
                debug!(location = %loc, "block no longer a container, skipping refill");
                self.skipped += 1;
                continue;
            }
            self.refilled += 1;
            written += 1;
        }

        let finished = self.entries.len() == 0;
        if finished {
            info!(
                refilled = self.refilled,
                skipped = self.skipped,
                "container refill finished"
            );
        }
        RefillProgress {
            finished,
            refilled: self.refilled,
            skipped: self.skipped,
        }
    }
}
