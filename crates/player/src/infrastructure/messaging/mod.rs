//! Connection lifecycle types shared by the network transports.

mod connection;

pub(crate) use connection::StateCell;
pub use connection::{ConnectionHandle, ConnectionState, ConnectionStateObserver};
