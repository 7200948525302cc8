//! AgentDeck Shared - wire vocabulary for data channels
//!
//! This crate contains the types every transport and the channel adapter agree on:
//! - Channel names (`world_state`, `shopping_state`)
//! - Raw message representations and their decoding to text
//! - The relay frame format used by WebSocket relays
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - serde, futures-util, thiserror, tracing
//! 2. **No runtime** - decoding is synchronous; streams are only handed back
//! 3. **Closed dispatch** - every message classifies into one `Inbound` outcome

pub mod channels;
pub mod payload;
pub mod relay;

pub use channels::{ChannelName, UnknownChannel};
pub use payload::{
    classify, ByteView, DecodedText, Envelope, Inbound, InboundText, MessageStream, RawMessage,
};
pub use relay::RelayFrame;
