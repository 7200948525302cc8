//! Snapshot Publisher
//!
//! Holds the latest snapshot of one channel. Each decoded message is
//! normalized into a fresh snapshot and swapped in whole; observers only ever
//! see complete snapshots.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use agentdeck_domain::{normalize, SnapshotError, SnapshotSchema};
use agentdeck_shared::{ChannelName, InboundText};

use crate::sync::lock;

/// How sequence numbers on inbound messages are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderingPolicy {
    /// Apply every valid snapshot in delivery order
    ArrivalOrder,
    /// Discard sequenced snapshots not newer than the held one.
    /// Unsequenced snapshots are always applied.
    #[default]
    Monotonic,
}

impl OrderingPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderingPolicy::ArrivalOrder => "arrival",
            OrderingPolicy::Monotonic => "monotonic",
        }
    }
}

impl fmt::Display for OrderingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown ordering policy: {0} (expected arrival or monotonic)")]
pub struct UnknownOrdering(pub String);

impl FromStr for OrderingPolicy {
    type Err = UnknownOrdering;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arrival" | "arrival_order" => Ok(OrderingPolicy::ArrivalOrder),
            "monotonic" => Ok(OrderingPolicy::Monotonic),
            _ => Err(UnknownOrdering(s.to_string())),
        }
    }
}

/// Result of feeding one message to a publisher
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published,
    /// Sequence not newer than the held snapshot's
    Stale { held: u64, received: u64 },
    /// Normalization failed; the previous snapshot is kept
    Rejected(SnapshotError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

type Observer<S> = Arc<Mutex<Box<dyn FnMut(Arc<S>) + Send + 'static>>>;

pub struct SnapshotPublisher<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    channel: ChannelName,
    ordering: OrderingPolicy,
    snapshot: watch::Sender<Option<Arc<S>>>,
    last_sequence: Mutex<Option<u64>>,
    observers: Mutex<Vec<(ObserverId, Observer<S>)>>,
}

impl<S> Clone for SnapshotPublisher<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SnapshotSchema> SnapshotPublisher<S> {
    pub fn new(channel: ChannelName, ordering: OrderingPolicy) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                channel,
                ordering,
                snapshot,
                last_sequence: Mutex::new(None),
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn channel(&self) -> ChannelName {
        self.inner.channel
    }

    pub fn ordering(&self) -> OrderingPolicy {
        self.inner.ordering
    }

    /// `None` until the first valid snapshot arrives
    pub fn latest(&self) -> Option<Arc<S>> {
        self.inner.snapshot.borrow().clone()
    }

    /// Reactive view of [`latest`](Self::latest)
    pub fn watch(&self) -> watch::Receiver<Option<Arc<S>>> {
        self.inner.snapshot.subscribe()
    }

    /// Normalize `inbound` and, if accepted, replace the held snapshot and notify observers.
    pub fn ingest(&self, inbound: InboundText) -> PublishOutcome {
        let channel = self.inner.channel;
        let published = {
            let mut last_sequence = lock(&self.inner.last_sequence);

            if let (OrderingPolicy::Monotonic, Some(received), Some(held)) =
                (self.inner.ordering, inbound.sequence, *last_sequence)
            {
                if received <= held {
                    tracing::debug!(
                        channel = %channel,
                        sequence = received,
                        held,
                        "Discarding stale snapshot"
                    );
                    return PublishOutcome::Stale { held, received };
                }
            }

            let snapshot = match normalize::<S>(inbound.text.as_str()) {
                Ok(snapshot) => Arc::new(snapshot),
                Err(e) => {
                    tracing::warn!(
                        channel = %channel,
                        kind = e.kind(),
                        error = %e,
                        "Rejected {} snapshot, keeping the previous one",
                        S::KIND
                    );
                    return PublishOutcome::Rejected(e);
                }
            };

            if let Some(sequence) = inbound.sequence {
                *last_sequence = Some(last_sequence.map_or(sequence, |held| held.max(sequence)));
            }
            self.inner.snapshot.send_replace(Some(Arc::clone(&snapshot)));
            tracing::trace!(channel = %channel, sequence = ?inbound.sequence, "Snapshot published");
            snapshot
        };

        self.notify(published);
        PublishOutcome::Published
    }

    /// Register a callback for every published snapshot.
    pub fn on_update(&self, observer: impl FnMut(Arc<S>) + Send + 'static) -> ObserverId {
        let id = ObserverId(Uuid::new_v4());
        lock(&self.inner.observers).push((id, Arc::new(Mutex::new(Box::new(observer)))));
        id
    }

    /// Returns whether the observer was registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = lock(&self.inner.observers);
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner.observers).len()
    }

    /// Discard the held snapshot and sequence.
    pub fn clear(&self) {
        *lock(&self.inner.last_sequence) = None;
        self.inner.snapshot.send_replace(None);
    }

    fn notify(&self, snapshot: Arc<S>) {
        let observers: Vec<Observer<S>> = lock(&self.inner.observers)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            (*lock(&observer))(Arc::clone(&snapshot));
        }
    }
}

impl<S> fmt::Debug for SnapshotPublisher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotPublisher")
            .field("channel", &self.inner.channel)
            .field("ordering", &self.inner.ordering)
            .finish()
    }
}
