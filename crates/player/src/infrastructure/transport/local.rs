//! In-process transport.
//!
//! Producers call [`InMemoryTransport::publish`] directly. Used by tests and by
//! embedders that already receive channel data through some other client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agentdeck_domain::SnapshotError;
use agentdeck_shared::RawMessage;

use super::registry::TopicRegistry;
use crate::ports::outbound::{DataChannelPort, MessageCallback, TransportSubscription};

#[derive(Clone)]
pub struct InMemoryTransport {
    registry: TopicRegistry,
    available: Arc<AtomicBool>,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self {
            registry: TopicRegistry::new(),
            available: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `message` to the subscribers of `channel`; returns how many received it.
    pub fn publish(&self, channel: &str, message: impl Into<RawMessage>) -> usize {
        self.registry.dispatch(channel, message.into())
    }

    /// While unavailable, new subscriptions are refused.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.registry.subscriber_count(channel)
    }
}

impl DataChannelPort for InMemoryTransport {
    fn subscribe(
        &self,
        channel: &str,
        on_message: MessageCallback,
    ) -> Result<TransportSubscription, SnapshotError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(SnapshotError::transport_unavailable(format!(
                "in-memory transport is offline, cannot subscribe to {channel}"
            )));
        }
        Ok(self.registry.subscribe(channel, on_message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn published_messages_reach_subscribers() {
        let transport = InMemoryTransport::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let _subscription = transport
            .subscribe(
                "world_state",
                Box::new(move |message| {
                    sink.lock().expect("lock").push(message.shape());
                }),
            )
            .expect("subscribe");

        assert_eq!(transport.publish("world_state", "{}"), 1);
        assert_eq!(transport.publish("world_state", b"{}".to_vec()), 1);
        assert_eq!(*received.lock().expect("lock"), vec!["text", "bytes"]);
    }

    #[test]
    fn offline_transport_refuses_subscriptions() {
        let transport = InMemoryTransport::new();
        transport.set_available(false);
        let err = transport
            .subscribe("world_state", Box::new(|_| {}))
            .expect_err("offline");
        assert_eq!(err.kind(), "transport_unavailable");
        assert_eq!(transport.subscriber_count("world_state"), 0);
    }

    #[test]
    fn dropping_the_subscription_detaches() {
        let transport = InMemoryTransport::new();
        let subscription = transport
            .subscribe("shopping_state", Box::new(|_| {}))
            .expect("subscribe");
        assert_eq!(transport.subscriber_count("shopping_state"), 1);
        drop(subscription);
        assert_eq!(transport.subscriber_count("shopping_state"), 0);
    }
}
