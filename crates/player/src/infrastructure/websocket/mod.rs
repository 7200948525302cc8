//! WebSocket relay transport.
//!
//! The relay multiplexes every data channel over one socket as JSON frames
//! `{"topic": ..., "payload": ..., "seq": ...}`.

mod client;
mod core;

pub use client::{connect_with, create_connection, Connection, WebSocketTransport};
pub use self::core::{BackoffPolicy, BackoffState};
