//! Snapshot Hub
//!
//! One [`SnapshotPublisher`] per (channel, schema), shared by every lease.
//! The first lease subscribes the channel; releasing the last one unsubscribes
//! and discards the snapshot.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tokio::sync::watch;

use agentdeck_domain::{ShoppingSnapshot, SnapshotSchema, WorldSnapshot};
use agentdeck_shared::ChannelName;

use super::publisher::{ObserverId, OrderingPolicy, SnapshotPublisher};
use crate::infrastructure::ChannelSubscription;
use crate::ports::outbound::DataChannelPort;

type EntryKey = (ChannelName, TypeId);
type Entries = DashMap<EntryKey, HubEntry>;

struct HubEntry {
    leases: usize,
    publisher: Box<dyn Any + Send + Sync>,
    subscription: ChannelSubscription,
}

#[derive(Clone)]
pub struct SnapshotHub {
    transport: Arc<dyn DataChannelPort>,
    ordering: OrderingPolicy,
    entries: Arc<Entries>,
}

impl SnapshotHub {
    pub fn new(transport: Arc<dyn DataChannelPort>, ordering: OrderingPolicy) -> Self {
        Self {
            transport,
            ordering,
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn ordering(&self) -> OrderingPolicy {
        self.ordering
    }

    pub fn world_state(&self) -> SnapshotLease<WorldSnapshot> {
        self.lease(ChannelName::WorldState)
    }

    pub fn shopping_state(&self) -> SnapshotLease<ShoppingSnapshot> {
        self.lease(ChannelName::ShoppingState)
    }

    /// Lease the `S` snapshot of `channel`, subscribing it if no lease is live.
    pub fn lease<S: SnapshotSchema>(&self, channel: ChannelName) -> SnapshotLease<S> {
        let key = (channel, TypeId::of::<S>());
        let publisher = match self.entries.entry(key) {
            MapEntry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                match entry.publisher.downcast_ref::<SnapshotPublisher<S>>() {
                    Some(publisher) => {
                        entry.leases += 1;
                        publisher.clone()
                    }
                    None => {
                        tracing::error!(channel = %channel, "Hub entry holds the wrong schema, replacing it");
                        let (publisher, entry) = self.open::<S>(channel);
                        occupied.insert(entry);
                        publisher
                    }
                }
            }
            MapEntry::Vacant(vacant) => {
                let (publisher, entry) = self.open::<S>(channel);
                vacant.insert(entry);
                tracing::debug!(channel = %channel, kind = S::KIND, "Opened channel");
                publisher
            }
        };

        SnapshotLease {
            key,
            publisher,
            entries: Arc::clone(&self.entries),
            released: false,
        }
    }

    /// Number of live leases on the `S` snapshot of `channel`
    pub fn lease_count<S: SnapshotSchema>(&self, channel: ChannelName) -> usize {
        self.entries
            .get(&(channel, TypeId::of::<S>()))
            .map(|entry| entry.leases)
            .unwrap_or(0)
    }

    fn open<S: SnapshotSchema>(&self, channel: ChannelName) -> (SnapshotPublisher<S>, HubEntry) {
        let publisher = SnapshotPublisher::<S>::new(channel, self.ordering);
        let sink = publisher.clone();
        let subscription = ChannelSubscription::subscribe(self.transport.as_ref(), channel, move |text| {
            sink.ingest(text);
        });
        let entry = HubEntry {
            leases: 1,
            publisher: Box::new(publisher.clone()),
            subscription,
        };
        (publisher, entry)
    }
}

impl fmt::Debug for SnapshotHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotHub")
            .field("ordering", &self.ordering)
            .field("open_channels", &self.entries.len())
            .finish()
    }
}

/// A counted handle on a shared snapshot.
///
/// Cloning takes another lease; dropping or [`release`](Self::release)-ing gives it back.
pub struct SnapshotLease<S: SnapshotSchema> {
    key: EntryKey,
    publisher: SnapshotPublisher<S>,
    entries: Arc<Entries>,
    released: bool,
}

impl<S: SnapshotSchema> SnapshotLease<S> {
    pub fn channel(&self) -> ChannelName {
        self.key.0
    }

    /// `None` until a valid snapshot has been received
    pub fn latest(&self) -> Option<Arc<S>> {
        self.publisher.latest()
    }

    pub fn watch(&self) -> watch::Receiver<Option<Arc<S>>> {
        self.publisher.watch()
    }

    pub fn on_update(&self, observer: impl FnMut(Arc<S>) + Send + 'static) -> ObserverId {
        self.publisher.on_update(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.publisher.remove_observer(id)
    }

    pub fn release(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(mut entry) = self.entries.get_mut(&self.key) {
            entry.leases = entry.leases.saturating_sub(1);
        }
        // Unsubscribe outside the map lock
        let closed = self.entries.remove_if(&self.key, |_, entry| entry.leases == 0);
        if let Some((_, entry)) = closed {
            entry.subscription.unsubscribe();
            self.publisher.clear();
            tracing::debug!(channel = %self.key.0, kind = S::KIND, "Last lease released, channel closed");
        }
    }
}

impl<S: SnapshotSchema> Clone for SnapshotLease<S> {
    fn clone(&self) -> Self {
        if let Some(mut entry) = self.entries.get_mut(&self.key) {
            entry.leases += 1;
        }
        Self {
            key: self.key,
            publisher: self.publisher.clone(),
            entries: Arc::clone(&self.entries),
            released: false,
        }
    }
}

impl<S: SnapshotSchema> Drop for SnapshotLease<S> {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl<S: SnapshotSchema> fmt::Debug for SnapshotLease<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotLease")
            .field("channel", &self.key.0)
            .field("kind", &S::KIND)
            .finish()
    }
}
