//! Player-side snapshot pipeline.
//!
//! Subscribes to named data channels on a realtime transport, decodes and
//! normalizes every inbound message, and publishes the latest canonical
//! snapshot per channel.

pub mod config;
pub mod infrastructure;
pub mod ports;
pub mod state;

mod sync;

pub use config::{ConfigError, PlayerConfig};
pub use infrastructure::transport::InMemoryTransport;
pub use infrastructure::websocket::{create_connection, Connection, WebSocketTransport};
pub use infrastructure::{ChannelSubscription, ConnectionHandle, ConnectionState};
pub use state::{OrderingPolicy, SnapshotHub, SnapshotLease, SnapshotPublisher};
