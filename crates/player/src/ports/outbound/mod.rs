//! Outbound ports - Interfaces for external services
//!
//! The only external collaborator of the snapshot pipeline is the data-channel
//! transport owned by the realtime session.

pub mod data_channel_port;

pub use data_channel_port::{DataChannelPort, MessageCallback, TransportSubscription};

#[cfg(any(test, feature = "testing"))]
pub use data_channel_port::MockDataChannelPort;
