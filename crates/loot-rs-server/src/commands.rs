//! Console command dispatch for the loot service.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use loot_rs_game::{BreakOutcome, LootService, OpenOutcome, RejectReason};
use loot_rs_world::{LocationKey, LootTableId, MemoryWorld, PlayerId};

use crate::permissions::PermissionManager;
use crate::persistence::DataStore;

/// Result returned by a command handler.
pub struct CommandResult {
    /// Messages to print back to the console.
    pub messages: Vec<String>,
    /// If true, the server should shut down.
    pub should_stop: bool,
}

impl CommandResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            should_stop: false,
        }
    }
}

/// Console commands operating on the shared loot service and world.
///
/// The `open`/`break`/`place` commands drive the in-memory host so the
/// lifecycle can be exercised end to end from the console; a real host
/// integration would feed the same service calls from its event layer.
pub struct CommandHandler {
    service: Arc<LootService>,
    world: Arc<MemoryWorld>,
    store: Arc<DataStore>,
    permissions: PermissionManager,
}

impl CommandHandler {
    pub fn new(
        service: Arc<LootService>,
        world: Arc<MemoryWorld>,
        store: Arc<DataStore>,
        permissions: PermissionManager,
    ) -> Self {
        Self {
            service,
            world,
            store,
            permissions,
        }
    }

    pub fn handle(&mut self, line: &str) -> CommandResult {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return CommandResult {
                messages: Vec::new(),
                should_stop: false,
            };
        };
        let args: Vec<&str> = parts.collect();

        match command {
            "help" => self.cmd_help(),
            "refill" => self.cmd_refill(&args),
            "place" => self.cmd_place(&args),
            "open" => self.cmd_open(&args),
            "break" => self.cmd_break(&args),
            "list" => self.cmd_list(),
            "op" => self.cmd_op(&args),
            "deop" => self.cmd_deop(&args),
            "save" => self.cmd_save(),
            "stop" => CommandResult {
                messages: vec!["Stopping server...".into()],
                should_stop: true,
            },
            other => CommandResult::ok(format!(
                "Unknown command: {other}. Type help for a list of commands."
            )),
        }
    }

    fn cmd_help(&self) -> CommandResult {
        CommandResult {
            messages: vec![
                "Available commands:".into(),
                "  help                          List available commands".into(),
                "  refill [player]               Reset all managed containers".into(),
                "  place <loc> <slots> <table>   Place a pristine loot container".into(),
                "  open <player> <loc>           Open a container as a player".into(),
                "  break <player> <loc>          Break a container as a player".into(),
                "  list                          Show managed containers".into(),
                "  op <name> / deop <name>       Manage the operator list".into(),
                "  save                          Save container state now".into(),
                "  stop                          Save and stop the server".into(),
                "Locations are written world;x;y;z".into(),
            ],
            should_stop: false,
        }
    }

    /// `refill` from the console runs unconditionally; `refill <player>`
    /// applies the operator check on the named player's behalf.
    fn cmd_refill(&self, args: &[&str]) -> CommandResult {
        if let Some(player) = args.first() {
            if !self.permissions.is_op(player) {
                return CommandResult::ok("You do not have permission to use this command.");
            }
        }
        self.service.start_refill();
        CommandResult::ok("Starting container refill process...")
    }

    fn cmd_place(&self, args: &[&str]) -> CommandResult {
        let (Some(loc), Some(slots), Some(table)) = (args.first(), args.get(1), args.get(2))
        else {
            return CommandResult::ok("Usage: place <world;x;y;z> <slots> <table>");
        };
        let loc = match LocationKey::from_str(loc) {
            Ok(loc) => loc,
            Err(e) => return CommandResult::ok(format!("Bad location: {e}")),
        };
        let slots: usize = match slots.parse() {
            Ok(slots) => slots,
            Err(_) => return CommandResult::ok("Slot count must be a number."),
        };
        self.world
            .place_container(loc.clone(), slots, Some(LootTableId::new(*table)));
        CommandResult::ok(format!("Placed {slots}-slot container at {loc}."))
    }

    fn cmd_open(&self, args: &[&str]) -> CommandResult {
        let (Some(player), Some(loc)) = (args.first(), args.get(1)) else {
            return CommandResult::ok("Usage: open <player> <world;x;y;z>");
        };
        let loc = match LocationKey::from_str(loc) {
            Ok(loc) => loc,
            Err(e) => return CommandResult::ok(format!("Bad location: {e}")),
        };
        let player = PlayerId::new(*player);

        match self
            .service
            .on_open(self.world.as_ref(), &player, &loc, Instant::now())
        {
            OpenOutcome::NotTracked => {
                CommandResult::ok(format!("{loc} is not a loot container."))
            }
            OpenOutcome::Rejected(RejectReason::Cooldown) => {
                CommandResult::ok("Opening too fast, try again shortly.")
            }
            OpenOutcome::Rejected(RejectReason::InProgress) => {
                CommandResult::ok("That container is busy, try again shortly.")
            }
            OpenOutcome::Suppressed => {
                CommandResult::ok("Nothing to show for that container.")
            }
            OpenOutcome::Opened(inventory) => {
                let inventory = inventory.lock().unwrap_or_else(|e| e.into_inner());
                let mut messages = vec![format!(
                    "{}'s view of {loc} ({} slots):",
                    player,
                    inventory.slot_count()
                )];
                for (i, slot) in inventory.slots().iter().enumerate() {
                    if let Some(stack) = slot {
                        messages.push(format!("  [{i}] {} x{}", stack.name, stack.count));
                    }
                }
                if messages.len() == 1 {
                    messages.push("  (empty)".into());
                }
                CommandResult {
                    messages,
                    should_stop: false,
                }
            }
        }
    }

    fn cmd_break(&self, args: &[&str]) -> CommandResult {
        let (Some(player), Some(loc)) = (args.first(), args.get(1)) else {
            return CommandResult::ok("Usage: break <player> <world;x;y;z>");
        };
        let loc = match LocationKey::from_str(loc) {
            Ok(loc) => loc,
            Err(e) => return CommandResult::ok(format!("Bad location: {e}")),
        };
        let player = PlayerId::new(*player);

        match self.service.on_break(self.world.as_ref(), &player, &loc) {
            BreakOutcome::NotTracked => {
                self.world.remove_container(&loc);
                CommandResult::ok(format!("Broke plain block at {loc}."))
            }
            BreakOutcome::Warned => CommandResult::ok(
                "Warning: breaking this container deletes its loot for all players. \
                 Break it again to confirm.",
            ),
            BreakOutcome::Destroyed { was_managed } => {
                self.world.remove_container(&loc);
                if was_managed {
                    CommandResult::ok(format!("Destroyed managed container at {loc}."))
                } else {
                    CommandResult::ok(format!("Destroyed container at {loc}."))
                }
            }
        }
    }

    fn cmd_list(&self) -> CommandResult {
        let snapshot = self.service.registry().snapshot();
        if snapshot.is_empty() {
            return CommandResult::ok("No managed containers.");
        }
        let mut messages = vec![format!("{} managed container(s):", snapshot.len())];
        let mut entries: Vec<String> = snapshot
            .iter()
            .map(|c| {
                format!(
                    "  {} -> {} ({} player inventories)",
                    c.location,
                    c.loot_table,
                    c.inventories.len()
                )
            })
            .collect();
        entries.sort();
        messages.extend(entries);
        CommandResult {
            messages,
            should_stop: false,
        }
    }

    fn cmd_op(&mut self, args: &[&str]) -> CommandResult {
        let Some(name) = args.first() else {
            return CommandResult::ok("Usage: op <name>");
        };
        if self.permissions.add_op(name) {
            self.permissions.save();
            CommandResult::ok(format!("{name} is now an operator."))
        } else {
            CommandResult::ok(format!("{name} is already an operator."))
        }
    }

    fn cmd_deop(&mut self, args: &[&str]) -> CommandResult {
        let Some(name) = args.first() else {
            return CommandResult::ok("Usage: deop <name>");
        };
        if self.permissions.remove_op(name) {
            self.permissions.save();
            CommandResult::ok(format!("{name} is no longer an operator."))
        } else {
            CommandResult::ok(format!("{name} is not an operator."))
        }
    }

    fn cmd_save(&self) -> CommandResult {
        match self.store.save(&self.service.registry().snapshot()) {
            Ok(()) => CommandResult::ok(format!(
                "Saved container state to {}.",
                self.store.path().display()
            )),
            Err(e) => CommandResult::ok(format!("Save failed: {e}")),
        }
    }
}
