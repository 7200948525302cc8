//! Relay connection lifecycle.
//!
//! The connection task owns the socket and publishes its state through a
//! shared [`StateCell`]. Callers stop it with a [`ConnectionHandle`] and
//! watch it with [`ConnectionStateObserver`]s.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Never started, or stopped on request
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    /// Lost the socket and waiting out the backoff
    Reconnecting = 3,
    /// Gave up retrying
    Failed = 4,
}

impl ConnectionState {
    const ALL: [ConnectionState; 5] = [
        ConnectionState::Disconnected,
        ConnectionState::Connecting,
        ConnectionState::Connected,
        ConnectionState::Reconnecting,
        ConnectionState::Failed,
    ];

    fn decode(raw: u8) -> Self {
        Self::ALL
            .into_iter()
            .find(|state| *state as u8 == raw)
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Connecting, connected and reconnecting transports still take subscribers.
    pub fn accepts_subscriptions(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Reconnecting
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free connection state shared between the task and its observers.
#[derive(Clone)]
pub(crate) struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub(crate) fn new(initial: ConnectionState) -> Self {
        Self(Arc::new(AtomicU8::new(initial as u8)))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::decode(self.0.load(Ordering::SeqCst))
    }

    /// Store `next`, logging the transition when it changes anything.
    pub(crate) fn set(&self, next: ConnectionState) {
        let previous = ConnectionState::decode(self.0.swap(next as u8, Ordering::SeqCst));
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "Relay connection state changed");
        }
    }
}

/// Stops the connection task. Dropping it leaves the task running.
pub struct ConnectionHandle {
    cell: StateCell,
    stop: Option<oneshot::Sender<()>>,
}

impl ConnectionHandle {
    pub(crate) fn new(cell: StateCell, stop: oneshot::Sender<()>) -> Self {
        Self {
            cell,
            stop: Some(stop),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.cell.get()
    }

    pub fn is_connected(&self) -> bool {
        self.observer().is_connected()
    }

    /// Close the socket and stop reconnecting. The state settles on
    /// `Disconnected` once the task exits.
    pub fn disconnect(mut self) {
        if let Some(stop) = self.stop.take() {
            if stop.send(()).is_err() {
                tracing::debug!("Relay connection task already finished");
            }
        }
    }

    pub fn observer(&self) -> ConnectionStateObserver {
        ConnectionStateObserver {
            cell: self.cell.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ConnectionStateObserver {
    cell: StateCell,
}

impl ConnectionStateObserver {
    pub fn state(&self) -> ConnectionState {
        self.cell.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

impl fmt::Debug for ConnectionStateObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionStateObserver")
            .field(&self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_state_survives_the_atomic_cell() {
        let cell = StateCell::new(ConnectionState::Disconnected);
        for state in ConnectionState::ALL {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn unknown_raw_values_read_as_disconnected() {
        assert_eq!(ConnectionState::decode(42), ConnectionState::Disconnected);
    }

    #[test]
    fn only_live_states_accept_subscriptions() {
        let live: Vec<_> = ConnectionState::ALL
            .into_iter()
            .filter(|state| state.accepts_subscriptions())
            .collect();
        assert_eq!(
            live,
            [
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Reconnecting
            ]
        );
    }

    #[test]
    fn observer_tracks_the_task_and_disconnect_signals_it() {
        let cell = StateCell::new(ConnectionState::Connecting);
        let (stop, mut stopped) = oneshot::channel();
        let handle = ConnectionHandle::new(cell.clone(), stop);
        let observer = handle.observer();

        assert_eq!(observer.state(), ConnectionState::Connecting);
        cell.set(ConnectionState::Connected);
        assert!(observer.is_connected());
        assert!(handle.is_connected());
        assert_eq!(format!("{observer:?}"), "ConnectionStateObserver(Connected)");

        handle.disconnect();
        assert!(stopped.try_recv().is_ok());
    }
}
