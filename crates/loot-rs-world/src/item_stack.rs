//! Item stack stored in virtual inventory slots.

use serde::{Deserialize, Serialize};

/// A stack of one item type.
///
/// The host's full item representation (NBT, durability, enchantments) is out
/// of scope; the container system only needs an identifier and a count, both
/// of which round-trip through persistence unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Namespaced item identifier, e.g. `minecraft:diamond`.
    pub name: String,
    /// Number of items in the stack (>= 1; an empty slot is `None`, not a
    /// zero-count stack).
    pub count: u32,
}

impl ItemStack {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let stack = ItemStack::new("minecraft:diamond", 3);
        let json = serde_json::to_string(&stack).unwrap();
        assert_eq!(json, r#"{"name":"minecraft:diamond","count":3}"#);
        let back: ItemStack = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stack);
    }
}
