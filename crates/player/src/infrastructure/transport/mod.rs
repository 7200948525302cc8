//! Concrete [`DataChannelPort`](crate::ports::outbound::DataChannelPort) implementations.

mod local;
mod registry;

pub use local::InMemoryTransport;
pub use registry::TopicRegistry;
