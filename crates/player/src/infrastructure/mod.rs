pub mod channel_adapter;
pub mod messaging;
pub mod transport;
pub mod websocket;

pub use channel_adapter::{ChannelSubscription, TextSink};
pub use messaging::{ConnectionHandle, ConnectionState, ConnectionStateObserver};
