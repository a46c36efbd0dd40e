//! Loot materialization: fresh personal inventories from captured tables.

use tracing::warn;

use loot_rs_loot::{LootContext, LootTableRegistry};
use loot_rs_world::{share, LocationKey, LootTableId, PlayerId, SharedInventory, WorldHost};

/// Generate a fresh personal inventory for `player` at `loc`, sized to the
/// physical container's slot count.
///
/// Every call is an independent roll; callers that need a stable inventory
/// must store the returned handle (the registry does). Returns `None` when
/// the location no longer resolves to a container or the loot table
/// identifier is unknown; nothing is shown in that case.
pub fn materialize(
    world: &dyn WorldHost,
    tables: &LootTableRegistry,
    loc: &LocationKey,
    table_id: &LootTableId,
    player: &PlayerId,
) -> Option<SharedInventory> {
    let slot_count = world.slot_count(loc)?;
    let Some(table) = tables.resolve(table_id) else {
        warn!(table = %table_id, location = %loc, "unresolvable loot table, nothing to show");
        return None;
    };
    let ctx = LootContext {
        location: loc,
        player,
    };
    Some(share(table.fill_slots(slot_count, &ctx)))
}
