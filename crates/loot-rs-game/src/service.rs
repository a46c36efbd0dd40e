//! Facade tying the registry, gatekeeper, tick queue, and refill job into
//! one object the server loop drives.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::info;

use loot_rs_loot::LootTableRegistry;
use loot_rs_world::{LocationKey, PlayerId, WorldHost};

use crate::gatekeeper::{BreakOutcome, Gatekeeper, OpenOutcome};
use crate::refill::{RefillJob, RefillProgress};
use crate::registry::ContainerRegistry;
use crate::tick::{DeferredTask, TickQueue};

/// What one scheduler tick did.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickReport {
    /// Deferred tasks applied this tick.
    pub tasks_applied: usize,
    /// Refill progress, if a refill job ran this tick.
    pub refill: Option<RefillProgress>,
}

/// The loot container system as the server sees it.
///
/// Event handlers (`on_open`, `on_break`, `should_cancel_item_move`) and
/// `tick` are all called from the tick context; `registry()` is additionally
/// read by the persistence timer, which the registry's own locking covers.
pub struct LootService {
    registry: ContainerRegistry,
    gatekeeper: Gatekeeper,
    queue: TickQueue,
    tables: LootTableRegistry,
    refill: Mutex<Option<RefillJob>>,
    refill_budget: usize,
}

impl LootService {
    pub fn new(tables: LootTableRegistry, open_cooldown: Duration, refill_budget: usize) -> Self {
        Self {
            registry: ContainerRegistry::new(),
            gatekeeper: Gatekeeper::new(open_cooldown),
            queue: TickQueue::new(),
            tables,
            refill: Mutex::new(None),
            refill_budget,
        }
    }

    pub fn registry(&self) -> &ContainerRegistry {
        &self.registry
    }

    pub fn tables(&self) -> &LootTableRegistry {
        &self.tables
    }

    /// Container open attempt from the event layer.
    pub fn on_open(
        &self,
        world: &dyn WorldHost,
        player: &PlayerId,
        loc: &LocationKey,
        now: Instant,
    ) -> OpenOutcome {
        self.gatekeeper.handle_open(
            &self.registry,
            &self.tables,
            world,
            &self.queue,
            player,
            loc,
            now,
        )
    }

    /// Container break attempt from the event layer.
    pub fn on_break(
        &self,
        world: &dyn WorldHost,
        player: &PlayerId,
        loc: &LocationKey,
    ) -> BreakOutcome {
        self.gatekeeper.handle_break(&self.registry, world, player, loc)
    }

    /// Whether an automated item transfer out of `loc` must be cancelled.
    /// Managed containers expose an empty physical inventory; letting hoppers
    /// drain it would desync the personal views.
    pub fn should_cancel_item_move(&self, loc: &LocationKey) -> bool {
        self.registry.is_managed(loc)
    }

    /// Begin a batch refill over every currently managed container.
    ///
    /// Atomically drains the registry and drops all stored inventories and
    /// pending break warnings; the write-backs themselves run in budgeted
    /// slices on subsequent ticks. Returns the number of containers queued.
    pub fn start_refill(&self) -> usize {
        let entries = self.registry.snapshot_and_clear();
        self.gatekeeper.clear_all_warnings();
        let count = entries.len();
        info!(containers = count, "starting container refill");
        *self.lock_refill() = Some(RefillJob::new(entries, self.refill_budget));
        count
    }

    /// Run one scheduler tick: apply deferred tasks in order, then advance
    /// the refill job by one slice if one is active.
    pub fn tick(&self, world: &dyn WorldHost) -> TickReport {
        let tasks = self.queue.drain();
        let tasks_applied = tasks.len();
        for task in tasks {
            match task {
                DeferredTask::ClearBlockLootTable(loc) => {
                    world.set_block_loot_table(&loc, None);
                }
                DeferredTask::ReleaseGuard(loc) => self.gatekeeper.release_guard(&loc),
            }
        }

        let mut slot = self.lock_refill();
        let refill = slot.as_mut().map(|job| job.run_slice(world));
        if matches!(refill, Some(progress) if progress.finished) {
            *slot = None;
        }

        TickReport {
            tasks_applied,
            refill,
        }
    }

    fn lock_refill(&self) -> MutexGuard<'_, Option<RefillJob>> {
        self.refill.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loot_rs_loot::LootTableFile;
    use loot_rs_world::{LootTableId, MemoryWorld};

    const STICK_TABLE: &str = r#"{
        "pools": [
            { "rolls": 1, "entries": [ { "type": "item", "name": "minecraft:stick" } ] }
        ]
    }"#;

    const TABLE_ID: &str = "minecraft:chests/simple_dungeon";

    fn service(budget: usize) -> LootService {
        let mut tables = LootTableRegistry::new();
        tables.insert(
            LootTableId::new(TABLE_ID),
            LootTableFile::parse_json(STICK_TABLE).unwrap(),
        );
        LootService::new(tables, Duration::from_millis(500), budget)
    }

    fn place(world: &MemoryWorld, x: i32) -> LocationKey {
        let loc = LocationKey::new("overworld", x, 64, 0);
        world.place_container(loc.clone(), 27, Some(LootTableId::new(TABLE_ID)));
        loc
    }

    #[test]
    fn open_then_tick_clears_block_and_guard() {
        let svc = service(200);
        let world = MemoryWorld::new();
        let loc = place(&world, 0);
        let player = PlayerId::new("a");

        assert!(matches!(
            svc.on_open(&world, &player, &loc, Instant::now()),
            OpenOutcome::Opened(_)
        ));
        let report = svc.tick(&world);
        assert_eq!(report.tasks_applied, 2);
        assert!(report.refill.is_none());
        assert!(world.block_loot_table(&loc).is_none());
        assert!(svc.registry().is_managed(&loc));
    }

    #[test]
    fn hopper_pull_cancelled_only_for_managed() {
        let svc = service(200);
        let world = MemoryWorld::new();
        let loc = place(&world, 0);
        assert!(!svc.should_cancel_item_move(&loc));

        svc.on_open(&world, &PlayerId::new("a"), &loc, Instant::now());
        assert!(svc.should_cancel_item_move(&loc));
    }

    #[test]
    fn refill_restores_tables_and_resets_state() {
        let svc = service(2);
        let world = MemoryWorld::new();
        let player = PlayerId::new("a");
        let mut now = Instant::now();
        let locs: Vec<_> = (0..3).map(|x| place(&world, x)).collect();

        for loc in &locs {
            svc.on_open(&world, &player, loc, now);
            now += Duration::from_secs(1);
            svc.tick(&world);
            assert!(world.block_loot_table(loc).is_none());
        }
        // Leave a pending break warning; refill must clear it.
        assert!(matches!(
            svc.on_break(&world, &player, &locs[0]),
            BreakOutcome::Warned
        ));

        assert_eq!(svc.start_refill(), 3);
        assert!(svc.registry().is_empty());

        // Budget 2: two ticks to drain three entries.
        let first = svc.tick(&world).refill.unwrap();
        assert!(!first.finished);
        let second = svc.tick(&world).refill.unwrap();
        assert!(second.finished);
        assert_eq!(second.refilled, 3);
        assert!(svc.tick(&world).refill.is_none());

        for loc in &locs {
            assert!(world.block_loot_table(loc).is_some());
        }

        // Warning was dropped: breaking warns afresh, and since the block is
        // pristine again the container is loot-bearing.
        assert!(matches!(
            svc.on_break(&world, &player, &locs[0]),
            BreakOutcome::Warned
        ));
    }

    #[test]
    fn refill_counts_only_successful_writebacks() {
        let svc = service(200);
        let world = MemoryWorld::new();
        let player = PlayerId::new("a");
        let mut now = Instant::now();

        let kept = place(&world, 0);
        let gone = place(&world, 1);
        for loc in [&kept, &gone] {
            svc.on_open(&world, &player, loc, now);
            now += Duration::from_secs(1);
            svc.tick(&world);
        }
        world.remove_container(&gone);

        assert_eq!(svc.start_refill(), 2);
        let progress = svc.tick(&world).refill.unwrap();
        assert!(progress.finished);
        // The completion report counts write-backs; a vanished block is a
        // skip, never a processed container.
        assert_eq!(progress.refilled, 1);
        assert_eq!(progress.skipped, 1);
        assert!(world.block_loot_table(&kept).is_some());
    }

    #[test]
    fn containers_captured_after_refill_start_are_untouched() {
        let svc = service(200);
        let world = MemoryWorld::new();
        let player = PlayerId::new("a");
        let mut now = Instant::now();

        let early = place(&world, 0);
        svc.on_open(&world, &player, &early, now);
        now += Duration::from_secs(1);
        svc.tick(&world);

        assert_eq!(svc.start_refill(), 1);

        // Captured after the snapshot was taken.
        let late = place(&world, 1);
        svc.on_open(&world, &player, &late, now);
        let report = svc.tick(&world);
        assert!(report.refill.unwrap().finished);

        assert!(world.block_loot_table(&early).is_some());
        assert!(world.block_loot_table(&late).is_none());
        assert!(svc.registry().is_managed(&late));
    }
}
