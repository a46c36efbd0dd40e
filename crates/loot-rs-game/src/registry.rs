//! Authoritative map from location to managed-container state.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use loot_rs_world::{
    share, LocationKey, LootTableId, PlayerId, SharedInventory, VirtualInventory,
};

#[derive(Debug)]
struct ManagedContainer {
    loot_table: LootTableId,
    inventories: HashMap<PlayerId, SharedInventory>,
}

/// All currently managed containers.
///
/// A location appears here if and only if the physical container at that
/// location has had its loot table captured (and cleared from the block). A
/// location is never simultaneously pristine and managed.
///
/// Every operation takes `&self`; interior locking makes the registry safe
/// between the tick context and the persistence timer context. The lock is
/// held only for the duration of a single map mutation or snapshot copy.
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    inner: Mutex<HashMap<LocationKey, ManagedContainer>>,
}

/// Deep, detached copy of one managed container, for persistence.
#[derive(Debug, Clone)]
pub struct ContainerSnapshot {
    pub location: LocationKey,
    pub loot_table: LootTableId,
    pub inventories: Vec<(PlayerId, VirtualInventory)>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `loc` as managed with `loot_table` and no player inventories.
    ///
    /// Idempotent: if `loc` is already managed this is a silent no-op that
    /// leaves the existing loot table and inventories untouched. Returns
    /// whether the capture took effect.
    pub fn capture(&self, loc: LocationKey, loot_table: LootTableId) -> bool {
        let mut inner = self.lock();
        if inner.contains_key(&loc) {
            return false;
        }
        debug!(location = %loc, table = %loot_table, "captured container");
        inner.insert(
            loc,
            ManagedContainer {
                loot_table,
                inventories: HashMap::new(),
            },
        );
        true
    }

    pub fn is_managed(&self, loc: &LocationKey) -> bool {
        self.lock().contains_key(loc)
    }

    /// The captured loot table for a managed location.
    pub fn loot_table(&self, loc: &LocationKey) -> Option<LootTableId> {
        self.lock().get(loc).map(|c| c.loot_table.clone())
    }

    /// The live handle to a player's stored inventory at a managed location.
    pub fn player_inventory(&self, loc: &LocationKey, player: &PlayerId) -> Option<SharedInventory> {
        self.lock()
            .get(loc)
            .and_then(|c| c.inventories.get(player).cloned())
    }

    /// Store or replace a player's inventory at a managed location. Returns
    /// false (and stores nothing) if `loc` is not managed.
    pub fn put_player_inventory(
        &self,
        loc: &LocationKey,
        player: PlayerId,
        inventory: SharedInventory,
    ) -> bool {
        match self.lock().get_mut(loc) {
            Some(container) => {
                container.inventories.insert(player, inventory);
                true
            }
            None => false,
        }
    }

    /// Remove a location and all associated player inventories. Returns
    /// whether the location was managed.
    pub fn release(&self, loc: &LocationKey) -> bool {
        let removed = self.lock().remove(loc).is_some();
        if removed {
            debug!(location = %loc, "released container");
        }
        removed
    }

    /// Atomically return the loot-table mapping for all managed locations and
    /// clear the entire registry. Used exclusively by the batch refill
    /// processor so the refill never chases a moving target.
    pub fn snapshot_and_clear(&self) -> Vec<(LocationKey, LootTableId)> {
        let mut inner = self.lock();
        let drained: Vec<(LocationKey, LootTableId)> = inner
            .drain()
            .map(|(loc, container)| (loc, container.loot_table))
            .collect();
        drained
    }

    /// Deep copy of the full registry state, for the persistence write path.
    /// Inventories are copied out of their live handles; the registry itself
    /// is left untouched.
    pub fn snapshot(&self) -> Vec<ContainerSnapshot> {
        self.lock()
            .iter()
            .map(|(loc, container)| ContainerSnapshot {
                location: loc.clone(),
                loot_table: container.loot_table.clone(),
                inventories: container
                    .inventories
                    .iter()
                    .map(|(player, handle)| {
                        let inventory = handle
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .clone();
                        (player.clone(), inventory)
                    })
                    .collect(),
            })
            .collect()
    }

    /// Rehydrate a player inventory from persisted slot contents. Returns the
    /// stored live handle, or `None` if `loc` is not managed.
    pub fn restore_player_inventory(
        &self,
        loc: &LocationKey,
        player: PlayerId,
        inventory: VirtualInventory,
    ) -> Option<SharedInventory> {
        let handle = share(inventory);
        if self.put_player_inventory(loc, player, handle.clone()) {
            Some(handle)
        } else {
            None
        }
    }

    /// Number of managed locations.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<LocationKey, ManagedContainer>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loot_rs_world::ItemStack;
    use std::sync::Arc;

    fn loc(x: i32) -> LocationKey {
        LocationKey::new("overworld", x, 64, 0)
    }

    fn table(name: &str) -> LootTableId {
        LootTableId::new(name)
    }

    #[test]
    fn capture_is_idempotent() {
        let registry = ContainerRegistry::new();
        assert!(registry.capture(loc(1), table("minecraft:chests/simple_dungeon")));

        // Store an inventory, then try to capture again with a different table.
        let inv = share(VirtualInventory::with_slots(27));
        assert!(registry.put_player_inventory(&loc(1), PlayerId::new("a"), inv));
        assert!(!registry.capture(loc(1), table("minecraft:chests/other")));

        // Existing loot table and inventory map are untouched.
        assert_eq!(
            registry.loot_table(&loc(1)).unwrap().as_str(),
            "minecraft:chests/simple_dungeon"
        );
        assert!(registry
            .player_inventory(&loc(1), &PlayerId::new("a"))
            .is_some());
    }

    #[test]
    fn put_requires_managed_location() {
        let registry = ContainerRegistry::new();
        let inv = share(VirtualInventory::with_slots(27));
        assert!(!registry.put_player_inventory(&loc(2), PlayerId::new("a"), inv));
        assert!(registry
            .player_inventory(&loc(2), &PlayerId::new("a"))
            .is_none());
    }

    #[test]
    fn stored_inventory_keeps_identity() {
        let registry = ContainerRegistry::new();
        registry.capture(loc(3), table("t"));
        let inv = share(VirtualInventory::with_slots(9));
        registry.put_player_inventory(&loc(3), PlayerId::new("a"), inv.clone());

        let first = registry
            .player_inventory(&loc(3), &PlayerId::new("a"))
            .unwrap();
        let second = registry
            .player_inventory(&loc(3), &PlayerId::new("a"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &inv));
    }

    #[test]
    fn release_removes_everything() {
        let registry = ContainerRegistry::new();
        registry.capture(loc(4), table("t"));
        registry.put_player_inventory(
            &loc(4),
            PlayerId::new("a"),
            share(VirtualInventory::with_slots(9)),
        );

        assert!(registry.release(&loc(4)));
        assert!(!registry.is_managed(&loc(4)));
        assert!(registry
            .player_inventory(&loc(4), &PlayerId::new("a"))
            .is_none());
        assert!(!registry.release(&loc(4)));
    }

    #[test]
    fn snapshot_and_clear_drains() {
        let registry = ContainerRegistry::new();
        registry.capture(loc(5), table("t1"));
        registry.capture(loc(6), table("t2"));

        let mut snapshot = registry.snapshot_and_clear();
        snapshot.sort_by_key(|(l, _)| l.x);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].1.as_str(), "t1");
        assert_eq!(snapshot[1].1.as_str(), "t2");
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_copies_live_edits_without_clearing() {
        let registry = ContainerRegistry::new();
        registry.capture(loc(7), table("t"));
        let handle = share(VirtualInventory::with_slots(3));
        registry.put_player_inventory(&loc(7), PlayerId::new("a"), handle.clone());

        handle
            .lock()
            .unwrap()
            .set_slot(0, Some(ItemStack::new("minecraft:emerald", 2)));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].inventories.len(), 1);
        let (player, inventory) = &snapshot[0].inventories[0];
        assert_eq!(player.as_str(), "a");
        assert_eq!(inventory.slot(0).unwrap().name, "minecraft:emerald");

        // Registry untouched.
        assert_eq!(registry.len(), 1);

        // The snapshot is detached: later edits don't retroactively change it.
        handle.lock().unwrap().set_slot(0, None);
        assert_eq!(snapshot[0].inventories[0].1.slot(0).unwrap().count, 2);
    }

    #[test]
    fn restore_player_inventory_requires_managed() {
        let registry = ContainerRegistry::new();
        assert!(registry
            .restore_player_inventory(&loc(8), PlayerId::new("a"), VirtualInventory::with_slots(9))
            .is_none());

        registry.capture(loc(8), table("t"));
        let handle = registry
            .restore_player_inventory(&loc(8), PlayerId::new("a"), VirtualInventory::with_slots(9))
            .unwrap();
        let stored = registry
            .player_inventory(&loc(8), &PlayerId::new("a"))
            .unwrap();
        assert!(Arc::ptr_eq(&handle, &stored));
    }
}
