//! Deferred next-tick tasks with a guaranteed ordering.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use loot_rs_world::LocationKey;

/// A follow-up action deferred to the next scheduler tick.
///
/// Opening a pristine container is a two-phase operation: phase 1 strips the
/// captured loot table off the physical block (host mutations land on tick
/// boundaries), phase 2 releases the processing guard so new open
/// transactions may start. The queue is strictly FIFO, so scheduling phase 1
/// before phase 2 guarantees no interaction ever observes the pristine block
/// and the registry capture simultaneously true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredTask {
    /// Phase 1: clear the loot table from the physical block.
    ClearBlockLootTable(LocationKey),
    /// Phase 2: allow new open transactions at the location.
    ReleaseGuard(LocationKey),
}

/// FIFO queue of deferred tasks, drained once per tick.
#[derive(Debug, Default)]
pub struct TickQueue {
    queue: Mutex<VecDeque<DeferredTask>>,
}

impl TickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, task: DeferredTask) {
        self.lock().push_back(task);
    }

    /// Take every queued task, in scheduling order.
    pub fn drain(&self) -> Vec<DeferredTask> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<DeferredTask>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
