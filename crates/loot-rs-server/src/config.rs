use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub loot: LootSection,
    #[serde(default)]
    pub persistence: PersistenceSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    /// Directory holding the data file and the ops list.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "data".into()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LootSection {
    /// Directory scanned recursively for loot table JSON files.
    #[serde(default = "default_tables_dir")]
    pub tables_dir: String,
    /// Minimum interval between accepted container opens per player, in
    /// milliseconds.
    #[serde(default = "default_open_cooldown_ms")]
    pub open_cooldown_ms: u64,
    /// Maximum successful refill write-backs per tick.
    #[serde(default = "default_refill_batch_size")]
    pub refill_batch_size: usize,
}

fn default_tables_dir() -> String {
    "loot_tables".into()
}

fn default_open_cooldown_ms() -> u64 {
    500
}

fn default_refill_batch_size() -> usize {
    200
}

impl Default for LootSection {
    fn default() -> Self {
        Self {
            tables_dir: default_tables_dir(),
            open_cooldown_ms: default_open_cooldown_ms(),
            refill_batch_size: default_refill_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PersistenceSection {
    /// Auto-save interval in seconds. 0 = disabled. Default: 600 (10 minutes).
    #[serde(default = "default_auto_save_interval")]
    pub auto_save_interval: u64,
}

fn default_auto_save_interval() -> u64 {
    600
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self {
            auto_save_interval: default_auto_save_interval(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ServerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}
