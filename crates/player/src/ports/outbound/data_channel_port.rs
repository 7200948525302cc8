//! Data Channel Port - Outbound port for topic-based realtime data
//!
//! This port abstracts the transport that multiplexes named data channels over a
//! single connection (a realtime room, a WebSocket relay, or an in-process bus),
//! so the channel adapter never depends on a concrete client.

use agentdeck_domain::SnapshotError;
use agentdeck_shared::RawMessage;

/// Callback invoked for every message delivered on a subscribed channel
pub type MessageCallback = Box<dyn FnMut(RawMessage) + Send + 'static>;

/// Releases a transport subscription.
///
/// Released on [`unsubscribe`](Self::unsubscribe) or drop, whichever comes first;
/// releasing twice is a no-op.
pub struct TransportSubscription {
    release: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TransportSubscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release
    pub fn noop() -> Self {
        Self { release: None }
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for TransportSubscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for TransportSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSubscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Topic-based data channel transport.
///
/// NOTE: This trait is intentionally **object-safe** so hubs can hold an
/// `Arc<dyn DataChannelPort>` regardless of the concrete transport.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait DataChannelPort: Send + Sync {
    /// Begin delivering messages published on `channel` to `on_message`.
    ///
    /// Returns [`SnapshotError::TransportUnavailable`] when the transport cannot
    /// accept subscriptions (closed, or gave up reconnecting).
    fn subscribe(
        &self,
        channel: &str,
        on_message: MessageCallback,
    ) -> Result<TransportSubscription, SnapshotError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn release_runs_exactly_once() {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = Arc::clone(&count);
        let subscription = TransportSubscription::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        subscription.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases() {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = Arc::clone(&count);
        {
            let _subscription = TransportSubscription::new(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
