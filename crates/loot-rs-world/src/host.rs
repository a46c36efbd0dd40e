//! Host-world interface consumed by the container lifecycle.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::ids::LootTableId;
use crate::location::LocationKey;

/// Access to the host world's physical containers.
///
/// Implementations resolve a [`LocationKey`] to a live block only when asked;
/// a location that does not currently resolve (unloaded chunk, block replaced)
/// answers `false`/`None`. That is a normal, recoverable case, never an
/// error.
pub trait WorldHost: Send + Sync {
    /// Whether the block at `loc` is a supported container type (chest,
    /// barrel, ...).
    fn is_container(&self, loc: &LocationKey) -> bool;

    /// Slot count of the physical container, or `None` if `loc` is not a
    /// resolvable container.
    fn slot_count(&self, loc: &LocationKey) -> Option<usize>;

    /// The unconsumed loot table assigned to the physical block, if any.
    /// `Some` means the block is pristine.
    fn block_loot_table(&self, loc: &LocationKey) -> Option<LootTableId>;

    /// Assign (`Some`) or clear (`None`) the block's loot table. Returns
    /// whether the mutation was applied; it is not if `loc` does not resolve
    /// to a supported container.
    fn set_block_loot_table(&self, loc: &LocationKey, table: Option<LootTableId>) -> bool;

    /// Whether the chunk containing `loc` is currently loaded.
    fn is_chunk_loaded(&self, loc: &LocationKey) -> bool;
}

#[derive(Debug, Clone)]
struct ContainerBlock {
    slot_count: usize,
    loot_table: Option<LootTableId>,
}

#[derive(Debug, Default)]
struct MemoryWorldInner {
    containers: HashMap<LocationKey, ContainerBlock>,
    unloaded_chunks: HashSet<(String, i32, i32)>,
}

/// In-memory [`WorldHost`] implementation.
///
/// Used by the server binary (the host simulation itself is out of scope) and
/// by tests. Every chunk is loaded unless explicitly marked unloaded.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    inner: Mutex<MemoryWorldInner>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a supported container with `slot_count` slots and an optional
    /// pristine loot table.
    pub fn place_container(
        &self,
        loc: LocationKey,
        slot_count: usize,
        loot_table: Option<LootTableId>,
    ) {
        self.lock().containers.insert(
            loc,
            ContainerBlock {
                slot_count,
                loot_table,
            },
        );
    }

    /// Remove the block at `loc` (a confirmed break, or any other mutation
    /// that makes the location stop resolving).
    pub fn remove_container(&self, loc: &LocationKey) {
        self.lock().containers.remove(loc);
    }

    /// Mark a chunk loaded or unloaded.
    pub fn set_chunk_loaded(&self, world: &str, cx: i32, cz: i32, loaded: bool) {
        let key = (world.to_string(), cx, cz);
        let mut inner = self.lock();
        if loaded {
            inner.unloaded_chunks.remove(&key);
        } else {
            inner.unloaded_chunks.insert(key);
        }
    }

    /// All container locations, for console listing.
    pub fn container_locations(&self) -> Vec<LocationKey> {
        self.lock().containers.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryWorldInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorldHost for MemoryWorld {
    fn is_container(&self, loc: &LocationKey) -> bool {
        self.lock().containers.contains_key(loc)
    }

    fn slot_count(&self, loc: &LocationKey) -> Option<usize> {
        self.lock().containers.get(loc).map(|c| c.slot_count)
    }

    fn block_loot_table(&self, loc: &LocationKey) -> Option<LootTableId> {
        self.lock()
            .containers
            .get(loc)
            .and_then(|c| c.loot_table.clone())
    }

    fn set_block_loot_table(&self, loc: &LocationKey, table: Option<LootTableId>) -> bool {
        match self.lock().containers.get_mut(loc) {
            Some(block) => {
                block.loot_table = table;
                true
            }
            None => false,
        }
    }

    fn is_chunk_loaded(&self, loc: &LocationKey) -> bool {
        let (cx, cz) = loc.chunk();
        !self
            .lock()
            .unloaded_chunks
            .contains(&(loc.world.clone(), cx, cz))
    }
}
