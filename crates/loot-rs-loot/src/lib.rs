//! Loot table parsing, evaluation, and identifier resolution.

pub mod registry;
pub mod table;

pub use registry::LootTableRegistry;
pub use table::{LootContext, LootDrop, LootTableFile};
