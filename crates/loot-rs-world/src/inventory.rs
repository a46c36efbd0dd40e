//! Virtual per-player inventories.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::item_stack::ItemStack;

/// Ordered slots mirroring a physical container.
///
/// `None` is an empty slot. Slot count is fixed at creation to match the
/// physical block; there is no size negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualInventory {
    slots: Vec<Option<ItemStack>>,
}

impl VirtualInventory {
    /// A new inventory with `slot_count` empty slots.
    pub fn with_slots(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count],
        }
    }

    pub fn from_slots(slots: Vec<Option<ItemStack>>) -> Self {
        Self { slots }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&ItemStack> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    /// Replace the contents of a slot. Out-of-range indices are ignored.
    pub fn set_slot(&mut self, index: usize, stack: Option<ItemStack>) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = stack;
        }
    }

    pub fn slots(&self) -> &[Option<ItemStack>] {
        &self.slots
    }

    /// Whether every slot is vacant.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    /// Indices of vacant slots.
    pub fn vacant_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i)
            .collect()
    }
}

/// Shared handle to a live virtual inventory.
///
/// The registry holds the canonical reference; whoever has the inventory open
/// edits through the same handle, so a re-open always returns the live,
/// possibly-edited object rather than a stale copy. Identity is the contract:
/// compare handles with [`Arc::ptr_eq`], not by contents.
pub type SharedInventory = Arc<Mutex<VirtualInventory>>;

/// Wrap an inventory in a shared handle.
pub fn share(inventory: VirtualInventory) -> SharedInventory {
    Arc::new(Mutex::new(inventory))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_start_empty() {
        let inv = VirtualInventory::with_slots(27);
        assert_eq!(inv.slot_count(), 27);
        assert!(inv.is_empty());
        assert_eq!(inv.vacant_slots().len(), 27);
    }

    #[test]
    fn set_and_get_slot() {
        let mut inv = VirtualInventory::with_slots(3);
        inv.set_slot(1, Some(ItemStack::new("minecraft:stick", 5)));
        assert!(inv.slot(0).is_none());
        assert_eq!(inv.slot(1).unwrap().count, 5);
        assert_eq!(inv.vacant_slots(), vec![0, 2]);

        inv.set_slot(1, None);
        assert!(inv.is_empty());
    }

    #[test]
    fn out_of_range_set_is_ignored() {
        let mut inv = VirtualInventory::with_slots(2);
        inv.set_slot(9, Some(ItemStack::new("minecraft:dirt", 1)));
        assert!(inv.is_empty());
    }

    #[test]
    fn shared_handle_reflects_edits() {
        let handle = share(VirtualInventory::with_slots(2));
        let alias = Arc::clone(&handle);
        alias
            .lock()
            .unwrap()
            .set_slot(0, Some(ItemStack::new("minecraft:apple", 2)));
        assert_eq!(handle.lock().unwrap().slot(0).unwrap().count, 2);
        assert!(Arc::ptr_eq(&handle, &alias));
    }
}
