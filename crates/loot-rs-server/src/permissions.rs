//! Operator list with JSON persistence.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

const OPS_FILE: &str = "ops.json";

/// Players allowed to run privileged commands (the refill trigger).
pub struct PermissionManager {
    path: PathBuf,
    ops: HashSet<String>,
}

impl PermissionManager {
    /// Load the ops list from `data_dir/ops.json`. A missing file means an
    /// empty list; a malformed file is reported and treated as empty.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(OPS_FILE);
        Self {
            ops: load_set(&path),
            path,
        }
    }

    pub fn is_op(&self, name: &str) -> bool {
        self.ops.contains(name)
    }

    pub fn add_op(&mut self, name: &str) -> bool {
        self.ops.insert(name.to_string())
    }

    pub fn remove_op(&mut self, name: &str) -> bool {
        self.ops.remove(name)
    }

    /// Save the ops list to disk as a sorted JSON array.
    pub fn save(&self) {
        let mut sorted: Vec<&String> = self.ops.iter().collect();
        sorted.sort();
        match serde_json::to_string_pretty(&sorted) {
            Ok(json) => {
                if let Err(e) = fs::write(&self.path, json) {
                    warn!("Failed to write {}: {e}", self.path.display());
                }
            }
            Err(e) => warn!("Failed to serialize {}: {e}", self.path.display()),
        }
    }
}

fn load_set(path: &Path) -> HashSet<String> {
    if !path.exists() {
        return HashSet::new();
    }
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<Vec<String>>(&contents) {
            Ok(vec) => {
                info!("Loaded {} entries from {}", vec.len(), path.display());
                vec.into_iter().collect()
            }
            Err(e) => {
                warn!("Failed to parse {}: {e}", path.display());
                HashSet::new()
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {e}", path.display());
            HashSet::new()
        }
    }
}
