//! Relay client using tokio-tungstenite

use std::future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

use agentdeck_domain::SnapshotError;
use agentdeck_shared::RelayFrame;

use super::core::{BackoffPolicy, BackoffState};
use crate::infrastructure::messaging::{
    ConnectionHandle, ConnectionState, ConnectionStateObserver, StateCell,
};
use crate::infrastructure::transport::TopicRegistry;
use crate::ports::outbound::{DataChannelPort, MessageCallback, TransportSubscription};

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`DataChannelPort`] backed by a WebSocket relay.
///
/// Subscriptions survive reconnects; they are refused once the connection
/// has failed or been shut down.
#[derive(Clone)]
pub struct WebSocketTransport {
    url: Arc<str>,
    registry: TopicRegistry,
    state: StateCell,
}

impl WebSocketTransport {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }
}

impl DataChannelPort for WebSocketTransport {
    fn subscribe(
        &self,
        channel: &str,
        on_message: MessageCallback,
    ) -> Result<TransportSubscription, SnapshotError> {
        let state = self.state();
        if !state.accepts_subscriptions() {
            return Err(SnapshotError::transport_unavailable(format!(
                "relay connection to {} is {state}, cannot subscribe to {channel}",
                self.url
            )));
        }
        Ok(self.registry.subscribe(channel, on_message))
    }
}

/// A running relay connection
pub struct Connection {
    pub transport: WebSocketTransport,
    pub handle: ConnectionHandle,
    pub state_observer: ConnectionStateObserver,
}

/// Connect to the relay at `url` with the default reconnect schedule.
///
/// Must be called from within a tokio runtime.
pub fn create_connection(url: &str) -> Result<Connection> {
    connect_with(url, BackoffPolicy::default())
}

pub fn connect_with(url: &str, policy: BackoffPolicy) -> Result<Connection> {
    let parsed = Url::parse(url).with_context(|| format!("invalid relay URL: {url}"))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        bail!("relay URL must use ws:// or wss://, got {url}");
    }
    let runtime = tokio::runtime::Handle::try_current()
        .context("relay connection requires a running tokio runtime")?;

    let state = StateCell::new(ConnectionState::Connecting);
    let (disconnect_tx, disconnect_rx) = oneshot::channel();
    let transport = WebSocketTransport {
        url: Arc::from(url),
        registry: TopicRegistry::new(),
        state: state.clone(),
    };

    runtime.spawn(run_connection(
        Arc::clone(&transport.url),
        transport.registry.clone(),
        state.clone(),
        policy,
        DisconnectSignal::new(disconnect_rx),
    ));

    let handle = ConnectionHandle::new(state, disconnect_tx);
    let state_observer = handle.observer();
    Ok(Connection {
        transport,
        handle,
        state_observer,
    })
}

/// Resolves once a disconnect was requested. Never resolves if the handle was
/// dropped without asking.
struct DisconnectSignal {
    rx: Option<oneshot::Receiver<()>>,
    fired: bool,
}

impl DisconnectSignal {
    fn new(rx: oneshot::Receiver<()>) -> Self {
        Self {
            rx: Some(rx),
            fired: false,
        }
    }

    async fn requested(&mut self) {
        if self.fired {
            return;
        }
        let Some(rx) = self.rx.as_mut() else {
            return future::pending().await;
        };
        match rx.await {
            Ok(()) => {
                self.fired = true;
                self.rx = None;
            }
            Err(_) => {
                self.rx = None;
                future::pending::<()>().await;
            }
        }
    }
}

enum StreamEnd {
    Disconnected,
    Lost,
}

async fn run_connection(
    url: Arc<str>,
    registry: TopicRegistry,
    state: StateCell,
    policy: BackoffPolicy,
    mut disconnect: DisconnectSignal,
) {
    let mut backoff = BackoffState::new(policy);

    loop {
        let attempt = tokio::select! {
            _ = disconnect.requested() => break,
            result = connect_async(&*url) => result,
        };

        match attempt {
            Ok((socket, _)) => {
                tracing::info!(url = %url, "Connected to relay");
                state.set(ConnectionState::Connected);
                backoff.reset();
                match read_frames(socket, &registry, &mut disconnect).await {
                    StreamEnd::Disconnected => break,
                    StreamEnd::Lost => tracing::warn!(url = %url, "Relay connection lost"),
                }
            }
            Err(e) => tracing::warn!(url = %url, error = %e, "Failed to connect to relay"),
        }

        let Some(delay) = backoff.next_delay_and_advance() else {
            tracing::error!(
                url = %url,
                attempts = backoff.attempts(),
                "Max reconnection attempts reached, giving up"
            );
            state.set(ConnectionState::Failed);
            return;
        };
        state.set(ConnectionState::Reconnecting);
        tracing::info!(
            "Reconnection attempt {} of {}, waiting {}ms",
            backoff.attempts(),
            policy.max_attempts,
            delay
        );

        tokio::select! {
            _ = disconnect.requested() => break,
            _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
        }
    }

    tracing::info!(url = %url, "Relay connection closed on request");
    state.set(ConnectionState::Disconnected);
}

async fn read_frames(
    mut socket: RelaySocket,
    registry: &TopicRegistry,
    disconnect: &mut DisconnectSignal,
) -> StreamEnd {
    loop {
        tokio::select! {
            _ = disconnect.requested() => {
                if let Err(e) = socket.close(None).await {
                    tracing::debug!(error = %e, "Relay close handshake failed");
                }
                return StreamEnd::Disconnected;
            }
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => route_frame(registry, &text),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => route_frame(registry, text),
                    Err(e) => tracing::warn!(error = %e, "Ignoring binary relay frame that is not UTF-8"),
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Relay closed connection");
                    return StreamEnd::Lost;
                }
                // Ping/pong is answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Relay WebSocket error");
                    return StreamEnd::Lost;
                }
                None => return StreamEnd::Lost,
            }
        }
    }
}

fn route_frame(registry: &TopicRegistry, text: &str) {
    let frame = match RelayFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse relay frame");
            return;
        }
    };
    let topic = frame.topic.clone();
    let delivered = registry.dispatch(&topic, frame.into_message());
    tracing::trace!(topic = %topic, delivered, "Relay frame routed");
}
