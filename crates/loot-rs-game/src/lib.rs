//! Container lifecycle core: registry, interaction gatekeeping, loot
//! materialization, deferred tick tasks, and the batch refill job.

pub mod gatekeeper;
pub mod materialize;
pub mod refill;
pub mod registry;
pub mod service;
pub mod tick;

pub use gatekeeper::{BreakOutcome, Gatekeeper, OpenOutcome, RejectReason};
pub use materialize::materialize;
pub use refill::{RefillJob, RefillProgress};
pub use registry::{ContainerRegistry, ContainerSnapshot};
pub use service::{LootService, TickReport};
pub use tick::{DeferredTask, TickQueue};
