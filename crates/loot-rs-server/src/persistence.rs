//! Container state persistence: one JSON document, written atomically.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use loot_rs_game::{ContainerRegistry, ContainerSnapshot};
use loot_rs_loot::LootTableRegistry;
use loot_rs_world::{LocationKey, LootTableId, PlayerId, VirtualInventory, WorldHost};

const DATA_FILE: &str = "containers.json";

/// On-disk document. Location keys serialize in their canonical
/// `world;x;y;z` form; inventory slots are positional, `null` meaning empty.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SavedState {
    #[serde(rename = "managed-containers", default)]
    containers: BTreeMap<String, String>,
    #[serde(rename = "personal-inventories", default)]
    inventories: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

/// What a load pass recovered, for the startup report.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub containers: usize,
    pub inventories: usize,
    /// Entries dropped because they failed to parse.
    pub skipped: usize,
}

/// Whole-file JSON store for managed-container state.
///
/// Every save serializes the full snapshot and lands it with a write to a
/// temporary sibling followed by a rename, so a crash mid-save leaves the
/// previous document intact. The internal lock serializes writers; the tick
/// loop and the auto-save timer may both call [`DataStore::save`].
pub struct DataStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DataStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(DATA_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a registry snapshot.
    pub fn save(&self, snapshot: &[ContainerSnapshot]) -> std::io::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut state = SavedState::default();
        for entry in snapshot {
            let key = entry.location.to_string();
            state
                .containers
                .insert(key.clone(), entry.loot_table.to_string());
            if entry.inventories.is_empty() {
                continue;
            }
            let per_player = state.inventories.entry(key).or_default();
            for (player, inventory) in &entry.inventories {
                let value = serde_json::to_value(inventory).map_err(std::io::Error::other)?;
                per_player.insert(player.to_string(), value);
            }
        }

        let json = serde_json::to_string_pretty(&state).map_err(std::io::Error::other)?;
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)
    }

    /// Rehydrate `registry` from disk.
    ///
    /// A missing file is a normal first start. A document that fails to parse
    /// as a whole is reported and treated as empty; within a readable
    /// document, individual entries that fail to parse are skipped so one bad
    /// record never discards the rest. Entries whose loot table is no longer
    /// known, or whose location no longer names a supported container in the
    /// live world, are abandoned the same way.
    pub fn load(
        &self,
        registry: &ContainerRegistry,
        tables: &LootTableRegistry,
        world: &dyn WorldHost,
    ) -> LoadReport {
        let mut report = LoadReport::default();
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
            Err(e) => {
                warn!("Failed to read {}: {e}", self.path.display());
                return report;
            }
        };
        let state: SavedState = match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                warn!("Failed to parse {}: {e}", self.path.display());
                return report;
            }
        };

        for (key, table) in state.containers {
            let loc = match LocationKey::from_str(&key) {
                Ok(loc) => loc,
                Err(e) => {
                    warn!(entry = %key, "Skipping unparseable container entry: {e}");
                    report.skipped += 1;
                    continue;
                }
            };
            let table = LootTableId::new(table);
            if tables.resolve(&table).is_none() {
                warn!(location = %loc, table = %table, "Skipping container with unknown loot table");
                report.skipped += 1;
                continue;
            }
            if !world.is_container(&loc) {
                warn!(location = %loc, "Skipping container no longer present in the world");
                report.skipped += 1;
                continue;
            }
            if registry.capture(loc, table) {
                report.containers += 1;
            }
        }

        for (key, per_player) in state.inventories {
            let loc = match LocationKey::from_str(&key) {
                Ok(loc) => loc,
                Err(e) => {
                    warn!(entry = %key, "Skipping inventories at unparseable location: {e}");
                    report.skipped += per_player.len();
                    continue;
                }
            };
            for (player, value) in per_player {
                let inventory: VirtualInventory = match serde_json::from_value(value) {
                    Ok(inventory) => inventory,
                    Err(e) => {
                        warn!(location = %loc, player = %player, "Skipping unparseable inventory: {e}");
                        report.skipped += 1;
                        continue;
                    }
                };
                // Inventories for locations absent from the container map are
                // orphans; they have no loot table to belong to.
                if registry
                    .restore_player_inventory(&loc, PlayerId::new(player.clone()), inventory)
                    .is_some()
                {
                    report.inventories += 1;
                } else {
                    warn!(location = %loc, player = %player, "Skipping inventory for unmanaged location");
                    report.skipped += 1;
                }
            }
        }

        info!(
            containers = report.containers,
            inventories = report.inventories,
            skipped = report.skipped,
            "loaded container state from {}",
            self.path.display()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loot_rs_loot::LootTableFile;
    use loot_rs_world::{ItemStack, MemoryWorld};

    const STICK_TABLE: &str = r#"{
        "pools": [
            { "rolls": 1, "entries": [ { "type": "item", "name": "minecraft:stick" } ] }
        ]
    }"#;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("loot_rs_store_{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn loc(x: i32) -> LocationKey {
        LocationKey::new("overworld", x, 64, 0)
    }

    fn known_tables(ids: &[&str]) -> LootTableRegistry {
        let mut tables = LootTableRegistry::new();
        for id in ids {
            tables.insert(
                LootTableId::new(*id),
                LootTableFile::parse_json(STICK_TABLE).unwrap(),
            );
        }
        tables
    }

    fn world_with_containers(xs: &[i32]) -> MemoryWorld {
        let world = MemoryWorld::new();
        for x in xs {
            world.place_container(loc(*x), 27, None);
        }
        world
    }

    fn populated_registry() -> ContainerRegistry {
        let registry = ContainerRegistry::new();
        registry.capture(loc(1), LootTableId::new("minecraft:chests/simple_dungeon"));
        registry.capture(loc(2), LootTableId::new("minecraft:chests/abandoned_mineshaft"));

        let mut inventory = VirtualInventory::with_slots(3);
        inventory.set_slot(0, Some(ItemStack::new("minecraft:diamond", 2)));
        registry
            .restore_player_inventory(&loc(1), PlayerId::new("alice"), inventory)
            .unwrap();
        registry
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = temp_dir();
        let store = DataStore::new(&dir);
        store.save(&populated_registry().snapshot()).unwrap();

        let tables = known_tables(&[
            "minecraft:chests/simple_dungeon",
            "minecraft:chests/abandoned_mineshaft",
        ]);
        let world = world_with_containers(&[1, 2]);
        let restored = ContainerRegistry::new();
        let report = store.load(&restored, &tables, &world);
        assert_eq!(report.containers, 2);
        assert_eq!(report.inventories, 1);
        assert_eq!(report.skipped, 0);

        assert_eq!(
            restored.loot_table(&loc(1)).unwrap().as_str(),
            "minecraft:chests/simple_dungeon"
        );
        let handle = restored
            .player_inventory(&loc(1), &PlayerId::new("alice"))
            .unwrap();
        let inventory = handle.lock().unwrap();
        assert_eq!(inventory.slot_count(), 3);
        assert_eq!(inventory.slot(0).unwrap().name, "minecraft:diamond");
        assert!(inventory.slot(1).is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = temp_dir();
        let store = DataStore::new(&dir);
        let registry = ContainerRegistry::new();
        let report = store.load(&registry, &LootTableRegistry::new(), &MemoryWorld::new());
        assert_eq!(report, LoadReport::default());
        assert!(registry.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unreadable_document_loads_empty() {
        let dir = temp_dir();
        let store = DataStore::new(&dir);
        std::fs::write(store.path(), "not json at all").unwrap();

        let registry = ContainerRegistry::new();
        let report = store.load(&registry, &LootTableRegistry::new(), &MemoryWorld::new());
        assert_eq!(report, LoadReport::default());
        assert!(registry.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn bad_entries_are_skipped_not_fatal() {
        let dir = temp_dir();
        let store = DataStore::new(&dir);
        let doc = r#"{
            "managed-containers": {
                "overworld;1;64;0": "minecraft:chests/simple_dungeon",
                "overworld;2;64;0": "minecraft:chests/unknown_table",
                "overworld;3;64;0": "minecraft:chests/simple_dungeon",
                "not-a-location": "minecraft:chests/simple_dungeon"
            },
            "personal-inventories": {
                "overworld;1;64;0": {
                    "alice": [null, {"name": "minecraft:stick", "count": 4}],
                    "bob": "garbage"
                },
                "overworld;9;64;9": {
                    "carol": [null]
                }
            }
        }"#;
        std::fs::write(store.path(), doc).unwrap();

        let tables = known_tables(&["minecraft:chests/simple_dungeon"]);
        // x=3 was a container on last shutdown but is gone from the world now.
        let world = world_with_containers(&[1, 2]);
        let registry = ContainerRegistry::new();
        let report = store.load(&registry, &tables, &world);
        assert_eq!(report.containers, 1);
        assert_eq!(report.inventories, 1);
        // unknown table, missing block, bad location key, bob's garbage,
        // carol's orphaned inventory
        assert_eq!(report.skipped, 5);

        let handle = registry
            .player_inventory(&loc(1), &PlayerId::new("alice"))
            .unwrap();
        assert_eq!(handle.lock().unwrap().slot(1).unwrap().count, 4);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn save_replaces_previous_document() {
        let dir = temp_dir();
        let store = DataStore::new(&dir);
        store.save(&populated_registry().snapshot()).unwrap();

        // Shrink the state and save again; the old entries must be gone.
        let registry = ContainerRegistry::new();
        registry.capture(loc(9), LootTableId::new("minecraft:chests/ruin"));
        store.save(&registry.snapshot()).unwrap();

        let tables = known_tables(&["minecraft:chests/ruin", "minecraft:chests/simple_dungeon"]);
        let world = world_with_containers(&[1, 2, 9]);
        let restored = ContainerRegistry::new();
        let report = store.load(&restored, &tables, &world);
        assert_eq!(report.containers, 1);
        assert!(restored.is_managed(&loc(9)));
        assert!(!restored.is_managed(&loc(1)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn save_leaves_no_temporary_sibling() {
        let dir = temp_dir();
        let store = DataStore::new(&dir);
        store.save(&populated_registry().snapshot()).unwrap();
        store.save(&populated_registry().snapshot()).unwrap();

        assert!(store.path().exists());
        assert!(!store.path().with_extension("json.tmp").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_save_leaves_previous_document_untouched() {
        let dir = temp_dir();
        let store = DataStore::new(&dir);
        store.save(&populated_registry().snapshot()).unwrap();
        let before = std::fs::read(store.path()).unwrap();

        // Occupy the temporary sibling with a directory so the staging write
        // fails before any rename can happen.
        let tmp = store.path().with_extension("json.tmp");
        std::fs::create_dir(&tmp).unwrap();

        let registry = ContainerRegistry::new();
        registry.capture(loc(9), LootTableId::new("minecraft:chests/ruin"));
        assert!(store.save(&registry.snapshot()).is_err());

        assert_eq!(std::fs::read(store.path()).unwrap(), before);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn background_save_runs_alongside_registry_mutation() {
        let dir = temp_dir();
        let store = std::sync::Arc::new(DataStore::new(&dir));
        let registry = populated_registry();

        // The write happens off the mutating thread, as the autosave task
        // does it: snapshot first, then hand the copy to the writer.
        let snapshot = registry.snapshot();
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || store.save(&snapshot))
        };
        registry.capture(loc(7), LootTableId::new("minecraft:chests/ruin"));
        registry.release(&loc(2));
        writer.join().unwrap().unwrap();

        // The saved document reflects the snapshot, not the later edits.
        let tables = known_tables(&[
            "minecraft:chests/simple_dungeon",
            "minecraft:chests/abandoned_mineshaft",
        ]);
        let world = world_with_containers(&[1, 2]);
        let restored = ContainerRegistry::new();
        let report = store.load(&restored, &tables, &world);
        assert_eq!(report.containers, 2);
        assert!(restored.is_managed(&loc(2)));
        assert!(!restored.is_managed(&loc(7)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_inventory_maps_are_omitted() {
        let dir = temp_dir();
        let store = DataStore::new(&dir);
        let registry = ContainerRegistry::new();
        registry.capture(loc(1), LootTableId::new("t"));
        store.save(&registry.snapshot()).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(doc["managed-containers"]["overworld;1;64;0"].is_string());
        assert!(doc["personal-inventories"]
            .as_object()
            .unwrap()
            .is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
