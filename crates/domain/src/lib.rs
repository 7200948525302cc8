//! AgentDeck Domain - canonical snapshot state
//!
//! The backend streams loosely-typed JSON state snapshots over named data
//! channels. This crate owns the canonical shapes the UI renders and the
//! normalizer that coerces wire documents into them.
//!
//! # Design Principles
//!
//! 1. **Pure** - no runtime, no I/O; normalization is synchronous
//! 2. **All-or-nothing** - a document either becomes a complete snapshot or an error
//! 3. **Tolerant** - missing fields are defaulted, unknown fields are passed through

pub mod error;
pub mod snapshot;

pub use error::SnapshotError;
pub use snapshot::quests::{Quest, QuestLog};
pub use snapshot::shopping::{CartLine, Order, OrderItem, Product, ShoppingSnapshot};
pub use snapshot::world::{AttributeValue, InventoryItem, Npc, NpcEntry, Player, WorldSnapshot};
pub use snapshot::{json_kind, normalize, SnapshotSchema};
