//! Loot table registry: resolve-by-identifier and directory loading.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use loot_rs_world::LootTableId;

use crate::table::LootTableFile;

/// All known loot tables, keyed by namespaced identifier.
///
/// Directory layout maps to identifiers the Minecraft way: the first path
/// component is the namespace, the rest is the table path, so
/// `loot_tables/minecraft/chests/simple_dungeon.json` resolves as
/// `minecraft:chests/simple_dungeon`. A file at the directory root keeps its
/// bare stem as the identifier.
#[derive(Debug, Default)]
pub struct LootTableRegistry {
    tables: HashMap<LootTableId, LootTableFile>,
}

impl LootTableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table under an identifier, replacing any previous table.
    pub fn insert(&mut self, id: LootTableId, table: LootTableFile) {
        self.tables.insert(id, table);
    }

    /// Resolve an identifier to its table, if known.
    pub fn resolve(&self, id: &LootTableId) -> Option<&LootTableFile> {
        self.tables.get(id)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Load every `*.json` table under `dir`, recursively.
    ///
    /// A missing directory yields an empty registry; unreadable or
    /// unparseable files are skipped with a warning. Never fails the load.
    pub fn load_dir(dir: &Path) -> Self {
        let mut registry = Self::new();
        let mut files = Vec::new();
        collect_json_files(dir, &mut files);

        for path in files {
            let Some(id) = identifier_for(dir, &path) else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(content) => match LootTableFile::parse_json(&content) {
                    Ok(table) => {
                        registry.insert(LootTableId::new(id), table);
                    }
                    Err(e) => warn!("Failed to parse loot table {}: {e}", path.display()),
                },
                Err(e) => warn!("Failed to read {}: {e}", path.display()),
            }
        }

        if !registry.is_empty() {
            info!(
                "Loaded {} loot table(s) from {}",
                registry.len(),
                dir.display()
            );
        }
        registry
    }
}

/// Recursively gather `*.json` files under `dir`.
fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_json_files(&path, out);
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            out.push(path);
        }
    }
}

/// Map a file path under `root` to its namespaced identifier.
fn identifier_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let mut components = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned());
    let first = components.next()?;
    let rest: Vec<String> = components.collect();
    if rest.is_empty() {
        Some(first)
    } else {
        Some(format!("{}:{}", first, rest.join("/")))
    }
}
