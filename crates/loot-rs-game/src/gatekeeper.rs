//! Interaction gatekeeping: break confirmation, open transactions, cooldowns,
//! and the processing guard.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use loot_rs_loot::LootTableRegistry;
use loot_rs_world::{LocationKey, LootTableId, PlayerId, SharedInventory, WorldHost};

use crate::materialize::materialize;
use crate::registry::ContainerRegistry;
use crate::tick::{DeferredTask, TickQueue};

/// Default minimum interval between accepted opens per player. Smooths out
/// double-fires of the same logical action from the host event system.
pub const DEFAULT_OPEN_COOLDOWN: Duration = Duration::from_millis(500);

/// Result of a break attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakOutcome {
    /// Not a loot-bearing container; the break proceeds untouched.
    NotTracked,
    /// First attempt: the break is cancelled and a warning recorded for this
    /// (player, location) pair.
    Warned,
    /// Confirmed second attempt: the break proceeds, and any managed state
    /// for the location has been released.
    Destroyed { was_managed: bool },
}

/// Why an open attempt was transiently rejected. Neither reason is a state
/// change; the player can simply try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The player's last accepted open was within the cooldown window.
    Cooldown,
    /// Another open transaction for this location is still completing.
    InProgress,
}

/// Result of an open attempt.
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    /// Not a loot-bearing container; the default physical open proceeds.
    NotTracked,
    /// Transient rejection; the physical open is cancelled.
    Rejected(RejectReason),
    /// The personal inventory to present. The physical open is cancelled;
    /// the physical slots are never shown directly.
    Opened(SharedInventory),
    /// The open was consumed but nothing can be shown (loot table absent or
    /// unresolvable). The physical open stays cancelled.
    Suppressed,
}

/// Per-player and per-location interaction state.
///
/// Drives all pristine→managed and managed→destroyed transitions through the
/// [`ContainerRegistry`]; nothing else mutates container lifecycle state
/// except the batch refill processor.
#[derive(Debug)]
pub struct Gatekeeper {
    cooldown: Duration,
    warnings: Mutex<HashMap<PlayerId, HashSet<LocationKey>>>,
    processing: Mutex<HashSet<LocationKey>>,
    cooldowns: Mutex<HashMap<PlayerId, Instant>>,
}

impl Default for Gatekeeper {
    fn default() -> Self {
        Self::new(DEFAULT_OPEN_COOLDOWN)
    }
}

impl Gatekeeper {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            warnings: Mutex::new(HashMap::new()),
            processing: Mutex::new(HashSet::new()),
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    /// Handle a break attempt by `player` at `loc`.
    ///
    /// Breaking a loot-bearing container is destructive and irreversible for
    /// every player's materialized loot, so the first attempt is cancelled
    /// with a warning; only a second attempt by the same player at the same
    /// location proceeds. Another player's attempt starts its own cycle.
    pub fn handle_break(
        &self,
        registry: &ContainerRegistry,
        world: &dyn WorldHost,
        player: &PlayerId,
        loc: &LocationKey,
    ) -> BreakOutcome {
        if !world.is_container(loc) {
            return BreakOutcome::NotTracked;
        }

        let is_pristine = world.block_loot_table(loc).is_some();
        let is_managed = registry.is_managed(loc);
        if !is_pristine && !is_managed {
            return BreakOutcome::NotTracked;
        }

        let confirmed = {
            let mut warnings = lock(&self.warnings);
            match warnings.get_mut(player) {
                Some(locations) => locations.remove(loc),
                None => false,
            }
        };

        if confirmed {
            if is_managed {
                registry.release(loc);
            }
            debug!(location = %loc, player = %player, "confirmed break");
            return BreakOutcome::Destroyed {
                was_managed: is_managed,
            };
        }

        lock(&self.warnings)
            .entry(player.clone())
            .or_default()
            .insert(loc.clone());
        BreakOutcome::Warned
    }

    /// Handle an open attempt by `player` at `loc` at time `now`.
    ///
    /// On a pristine capture the physical-block mutation and the guard
    /// release are both deferred to the next tick, in that order, so no
    /// concurrent open can observe a half-captured state or double-capture.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_open(
        &self,
        registry: &ContainerRegistry,
        tables: &LootTableRegistry,
        world: &dyn WorldHost,
        queue: &TickQueue,
        player: &PlayerId,
        loc: &LocationKey,
        now: Instant,
    ) -> OpenOutcome {
        if !world.is_container(loc) {
            return OpenOutcome::NotTracked;
        }

        if let Some(last) = lock(&self.cooldowns).get(player) {
            if now.duration_since(*last) < self.cooldown {
                return OpenOutcome::Rejected(RejectReason::Cooldown);
            }
        }

        if lock(&self.processing).contains(loc) {
            return OpenOutcome::Rejected(RejectReason::InProgress);
        }

        let pristine_table = world.block_loot_table(loc);
        let is_managed = registry.is_managed(loc);
        if pristine_table.is_none() && !is_managed {
            return OpenOutcome::NotTracked;
        }

        lock(&self.cooldowns).insert(player.clone(), now);
        lock(&self.processing).insert(loc.clone());

        let outcome = if let Some(table) = pristine_table {
            // PRISTINE → MANAGED: capture, then strip the block next tick.
            registry.capture(loc.clone(), table.clone());
            queue.schedule(DeferredTask::ClearBlockLootTable(loc.clone()));
            self.materialize_and_store(registry, tables, world, player, loc, &table)
        } else if let Some(existing) = registry.player_inventory(loc, player) {
            // Re-open: hand back the exact stored object so in-progress
            // edits survive.
            OpenOutcome::Opened(existing)
        } else {
            match registry.loot_table(loc) {
                Some(table) => {
                    self.materialize_and_store(registry, tables, world, player, loc, &table)
                }
                // Released between the is_managed check and here; treat as
                // nothing to show rather than falling through to the
                // physical inventory.
                None => OpenOutcome::Suppressed,
            }
        };

        queue.schedule(DeferredTask::ReleaseGuard(loc.clone()));
        outcome
    }

    fn materialize_and_store(
        &self,
        registry: &ContainerRegistry,
        tables: &LootTableRegistry,
        world: &dyn WorldHost,
        player: &PlayerId,
        loc: &LocationKey,
        table: &LootTableId,
    ) -> OpenOutcome {
        match materialize(world, tables, loc, table, player) {
            Some(inventory) => {
                registry.put_player_inventory(loc, player.clone(), inventory.clone());
                OpenOutcome::Opened(inventory)
            }
            None => OpenOutcome::Suppressed,
        }
    }

    /// Release the processing guard for a location (deferred phase 2).
    pub fn release_guard(&self, loc: &LocationKey) {
        lock(&self.processing).remove(loc);
    }

    /// Whether an open transaction is currently in flight at `loc`.
    pub fn is_guarded(&self, loc: &LocationKey) -> bool {
        lock(&self.processing).contains(loc)
    }

    /// Whether `player` has an unconfirmed break warning for `loc`.
    pub fn has_warning(&self, player: &PlayerId, loc: &LocationKey) -> bool {
        lock(&self.warnings)
            .get(player)
            .map(|locations| locations.contains(loc))
            .unwrap_or(false)
    }

    /// Drop every pending break warning. Only the batch refill processor may
    /// bulk-clear warnings together with the registry.
    pub fn clear_all_warnings(&self) {
        lock(&self.warnings).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
