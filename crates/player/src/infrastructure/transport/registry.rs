//! Per-topic subscriber registry shared by the transports.
//!
//! Callbacks are invoked outside the registry lock, so a callback may
//! unsubscribe (itself or others) while a message is being delivered.

use std::sync::{Arc, Mutex, Weak};

use dashmap::DashMap;
use uuid::Uuid;

use agentdeck_shared::RawMessage;

use crate::ports::outbound::{MessageCallback, TransportSubscription};
use crate::sync::lock;

type SharedCallback = Arc<Mutex<MessageCallback>>;
type Topics = DashMap<String, Vec<(Uuid, SharedCallback)>>;

#[derive(Clone, Default)]
pub struct TopicRegistry {
    topics: Arc<Topics>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `topic`. The returned subscription removes it again.
    pub fn subscribe(&self, topic: &str, callback: MessageCallback) -> TransportSubscription {
        let id = Uuid::new_v4();
        self.topics
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(Mutex::new(callback))));
        tracing::debug!(topic, subscription_id = %id, "Subscribed to topic");

        let topics: Weak<Topics> = Arc::downgrade(&self.topics);
        let topic = topic.to_string();
        TransportSubscription::new(move || {
            let Some(topics) = topics.upgrade() else {
                return;
            };
            if let Some(mut subscribers) = topics.get_mut(&topic) {
                subscribers.retain(|(sub_id, _)| *sub_id != id);
            }
            topics.remove_if(&topic, |_, subscribers| subscribers.is_empty());
            tracing::debug!(topic = %topic, subscription_id = %id, "Unsubscribed from topic");
        })
    }

    /// Deliver `message` to every subscriber of `topic`; returns how many received it.
    ///
    /// Messages that cannot be cloned (nested streams) go to the most recent subscriber only.
    pub fn dispatch(&self, topic: &str, message: RawMessage) -> usize {
        let callbacks: Vec<SharedCallback> = self
            .topics
            .get(topic)
            .map(|subscribers| subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        let Some((last, rest)) = callbacks.split_last() else {
            tracing::debug!(topic, shape = message.shape(), "No subscribers for topic, dropping message");
            return 0;
        };

        let mut delivered = 0;
        for callback in rest {
            match message.try_clone() {
                Some(copy) => {
                    (*lock(callback))(copy);
                    delivered += 1;
                }
                None => {
                    tracing::warn!(topic, shape = message.shape(), "Message cannot be shared, delivering to one subscriber");
                    break;
                }
            }
        }
        (*lock(last))(message);
        delivered + 1
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|subs| subs.len()).unwrap_or(0)
    }
}
