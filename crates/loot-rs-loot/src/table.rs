//! Loot table schema and evaluation (loot_tables/**/*.json).

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use loot_rs_world::{ItemStack, LocationKey, PlayerId, VirtualInventory};

/// Context for one generation roll: who triggered it, and where.
///
/// Generation is a fresh roll every call; repeated materialization for the
/// same player at the same location is not expected to reproduce the same
/// result. Callers that need a stable inventory must store the first result.
#[derive(Debug, Clone, Copy)]
pub struct LootContext<'a> {
    pub location: &'a LocationKey,
    pub player: &'a PlayerId,
}

/// A loot table with one or more pools.
#[derive(Debug, Clone, Deserialize)]
pub struct LootTableFile {
    #[serde(default)]
    pub pools: Vec<LootPool>,
}

/// A pool of loot entries rolled a number of times.
#[derive(Debug, Clone, Deserialize)]
pub struct LootPool {
    pub rolls: RollsValue,
    pub entries: Vec<LootEntry>,
}

/// Number of rolls, fixed or random range.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RollsValue {
    Fixed(u32),
    Range { min: u32, max: u32 },
}

impl RollsValue {
    fn roll(&self) -> u32 {
        match self {
            RollsValue::Fixed(n) => *n,
            RollsValue::Range { min, max } => rand::thread_rng().gen_range(*min..=*max),
        }
    }
}

/// A single entry in a loot pool.
#[derive(Debug, Clone, Deserialize)]
pub struct LootEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub functions: Vec<LootFunction>,
}

/// A function that modifies the loot result.
#[derive(Debug, Clone, Deserialize)]
pub struct LootFunction {
    pub function: String,
    #[serde(default)]
    pub count: Option<CountValue>,
}

/// Count value, fixed or random range.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CountValue {
    Fixed(u32),
    Range { min: u32, max: u32 },
}

impl CountValue {
    fn roll(&self) -> u32 {
        match self {
            CountValue::Fixed(n) => *n,
            CountValue::Range { min, max } => rand::thread_rng().gen_range(*min..=*max),
        }
    }
}

fn default_weight() -> u32 {
    1
}

/// A single item drop result.
#[derive(Debug, Clone)]
pub struct LootDrop {
    pub item_name: String,
    pub count: u32,
}

impl LootTableFile {
    /// Parse from a JSON string.
    pub fn parse_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("invalid loot table JSON: {e}"))
    }

    /// Roll all pools and collect drops.
    pub fn roll(&self) -> Vec<LootDrop> {
        let mut drops = Vec::new();
        for pool in &self.pools {
            let n = pool.rolls.roll();
            for _ in 0..n {
                if let Some(drop) = roll_pool(pool) {
                    drops.push(drop);
                }
            }
        }
        drops
    }

    /// Roll all pools and scatter the drops across a `slot_count`-slot
    /// inventory, one drop per randomly chosen vacant slot.
    ///
    /// Drops beyond the slot count are discarded, matching how a physical
    /// container would overflow.
    pub fn fill_slots(&self, slot_count: usize, ctx: &LootContext) -> VirtualInventory {
        let mut inventory = VirtualInventory::with_slots(slot_count);
        let drops = self.roll();

        let mut vacant = inventory.vacant_slots();
        vacant.shuffle(&mut rand::thread_rng());

        let mut placed = 0usize;
        for drop in &drops {
            let Some(slot) = vacant.pop() else {
                break;
            };
            inventory.set_slot(slot, Some(ItemStack::new(&drop.item_name, drop.count)));
            placed += 1;
        }

        debug!(
            location = %ctx.location,
            player = %ctx.player,
            rolled = drops.len(),
            placed,
            "generated loot"
        );
        inventory
    }
}

/// Select one entry from a pool using weighted random selection.
fn roll_pool(pool: &LootPool) -> Option<LootDrop> {
    if pool.entries.is_empty() {
        return None;
    }

    let total_weight: u32 = pool.entries.iter().map(|e| e.weight).sum();
    if total_weight == 0 {
        return None;
    }

    let mut roll = rand::thread_rng().gen_range(0..total_weight);
    for entry in &pool.entries {
        if roll < entry.weight {
            return entry_to_drop(entry);
        }
        roll -= entry.weight;
    }

    None
}

/// Convert a selected entry into a drop.
fn entry_to_drop(entry: &LootEntry) -> Option<LootDrop> {
    match entry.entry_type.as_str() {
        "item" => {
            let name = entry.name.as_ref()?;
            let mut count = 1u32;

            for func in &entry.functions {
                if func.function == "set_count" {
                    if let Some(ref cv) = func.count {
                        count = cv.roll();
                    }
                }
            }

            Some(LootDrop {
                item_name: name.clone(),
                count,
            })
        }
        "empty" => None,
        _ => None,
    }
}
