//! Channel Adapter
//!
//! Subscribes to one named channel on a [`DataChannelPort`], classifies every
//! inbound [`RawMessage`] and hands the decoded text to a sink. Failures are
//! logged here and never reach the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, ThreadId};

use futures_util::StreamExt;
use tokio::task::AbortHandle;

use agentdeck_shared::{classify, ChannelName, Inbound, InboundText, MessageStream, RawMessage};

use crate::ports::outbound::{DataChannelPort, MessageCallback, TransportSubscription};
use crate::sync::lock;

/// Receives decoded text for a channel
pub type TextSink = Box<dyn FnMut(InboundText) + Send + 'static>;

/// A live subscription to one channel.
///
/// Unsubscribes on drop. [`unsubscribe`](Self::unsubscribe) may be called any
/// number of times, including when the transport refused the subscription.
pub struct ChannelSubscription {
    state: Arc<AdapterState>,
}

struct AdapterState {
    channel: ChannelName,
    active: AtomicBool,
    transport: Mutex<Option<TransportSubscription>>,
    nested: Mutex<Vec<AbortHandle>>,
    sink: Mutex<TextSink>,
    /// Thread currently inside the sink, if any
    delivering: Mutex<Option<ThreadId>>,
}

impl ChannelSubscription {
    /// Start receiving `channel` from `transport`.
    ///
    /// If the transport is unavailable the returned subscription is inert.
    pub fn subscribe(
        transport: &dyn DataChannelPort,
        channel: ChannelName,
        sink: impl FnMut(InboundText) + Send + 'static,
    ) -> Self {
        let state = Arc::new(AdapterState {
            channel,
            active: AtomicBool::new(true),
            transport: Mutex::new(None),
            nested: Mutex::new(Vec::new()),
            sink: Mutex::new(Box::new(sink)),
            delivering: Mutex::new(None),
        });

        let weak = Arc::downgrade(&state);
        let on_message: MessageCallback = Box::new(move |message| {
            if let Some(state) = weak.upgrade() {
                state.receive(message);
            }
        });

        match transport.subscribe(channel.as_str(), on_message) {
            Ok(subscription) => {
                tracing::debug!(channel = %channel, "Subscribed to channel");
                *lock(&state.transport) = Some(subscription);
            }
            Err(e) => {
                tracing::warn!(
                    channel = %channel,
                    error = %e,
                    "Channel subscription unavailable, no updates will be delivered"
                );
                state.active.store(false, Ordering::SeqCst);
            }
        }

        Self { state }
    }

    pub fn channel(&self) -> ChannelName {
        self.state.channel
    }

    /// False once unsubscribed, or if the transport refused the subscription.
    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Stop processing and release the transport and any nested stream subscriptions.
    pub fn unsubscribe(&self) {
        let state = &self.state;
        if state.active.swap(false, Ordering::SeqCst) {
            tracing::debug!(channel = %state.channel, "Unsubscribing from channel");
        }

        let transport = lock(&state.transport).take();
        if let Some(subscription) = transport {
            subscription.unsubscribe();
        }

        let nested: Vec<AbortHandle> = lock(&state.nested).drain(..).collect();
        for task in nested {
            task.abort();
        }

        // Wait out a delivery in flight on another thread. From inside the
        // sink itself there is nothing to wait for.
        let reentrant = *lock(&state.delivering) == Some(thread::current().id());
        if !reentrant {
            drop(lock(&state.sink));
        }
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for ChannelSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSubscription")
            .field("channel", &self.state.channel)
            .field("active", &self.is_active())
            .finish()
    }
}

impl AdapterState {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn receive(self: &Arc<Self>, message: RawMessage) {
        if !self.is_active() {
            return;
        }
        match classify(message) {
            Ok(Inbound::Nested(stream)) => self.attach(stream),
            other => self.handle(other),
        }
    }

    /// Text and rejections; nested streams are only attached from the top level.
    fn handle(&self, inbound: Result<Inbound, agentdeck_domain::SnapshotError>) {
        match inbound {
            Ok(Inbound::Text(text)) => self.deliver(text),
            Ok(Inbound::Empty) => {
                tracing::debug!(channel = %self.channel, "Empty message, no update");
            }
            Ok(Inbound::Nested(_)) => {
                tracing::warn!(
                    channel = %self.channel,
                    shape = "stream",
                    "Dropping stream emitted by a nested stream"
                );
            }
            Err(e) => {
                tracing::warn!(
                    channel = %self.channel,
                    kind = e.kind(),
                    error = %e,
                    "Dropping message"
                );
            }
        }
    }

    /// The active flag is re-checked under the sink lock, which `unsubscribe`
    /// also takes, so no delivery starts or runs past an unsubscribe.
    fn deliver(&self, text: InboundText) {
        let mut sink = lock(&self.sink);
        if !self.is_active() {
            return;
        }
        *lock(&self.delivering) = Some(thread::current().id());
        (*sink)(text);
        *lock(&self.delivering) = None;
    }

    fn attach(self: &Arc<Self>, mut stream: MessageStream) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                channel = %self.channel,
                "Nested stream received outside a tokio runtime, dropping"
            );
            return;
        };

        let weak: Weak<Self> = Arc::downgrade(self);
        let task = runtime.spawn(async move {
            while let Some(message) = stream.next().await {
                let Some(state) = weak.upgrade() else { break };
                if !state.is_active() {
                    break;
                }
                state.handle(classify(message));
            }
        });

        let mut nested = lock(&self.nested);
        nested.retain(|handle| !handle.is_finished());
        nested.push(task.abort_handle());
        drop(nested);
        tracing::debug!(channel = %self.channel, "Attached nested stream");

        // Unsubscribed while spawning
        if !self.is_active() {
            task.abort();
        }
    }
}
