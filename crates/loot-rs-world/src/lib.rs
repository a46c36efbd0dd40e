//! Leaf types and the host-world interface for personal loot containers.

pub mod host;
pub mod ids;
pub mod inventory;
pub mod item_stack;
pub mod location;

pub use host::{MemoryWorld, WorldHost};
pub use ids::{LootTableId, PlayerId};
pub use inventory::{share, SharedInventory, VirtualInventory};
pub use item_stack::ItemStack;
pub use location::{LocationKey, LocationParseError};
