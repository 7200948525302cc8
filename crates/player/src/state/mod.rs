//! Snapshot state held on the player side
//!
//! [`SnapshotHub`] is the entry point; it owns one [`SnapshotPublisher`] per
//! open channel and hands out counted [`SnapshotLease`]s.

mod hub;
mod publisher;

pub use hub::{SnapshotHub, SnapshotLease};
pub use publisher::{ObserverId, OrderingPolicy, PublishOutcome, SnapshotPublisher, UnknownOrdering};
