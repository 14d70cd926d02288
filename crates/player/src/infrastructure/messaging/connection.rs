//! Connection lifecycle management.
//!
//! This module provides types for managing the WebSocket connection lifecycle,
//! including connection state observation and connect/disconnect control.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// Connection state for the game session.
///
/// `Disconnected → Connecting → AwaitingWelcome → Joined → Disconnected`,
/// with `Failed` as the terminal state after a non-retryable server error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to the server
    Disconnected,
    /// Transport is being opened
    Connecting,
    /// Transport open, JOIN sent, waiting for WELCOME
    AwaitingWelcome,
    /// Handshake complete
    Joined,
    /// Server refused the session permanently; reconnection is disabled
    Failed,
}

impl ConnectionState {
    /// Convert to u8 for atomic storage.
    pub fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::AwaitingWelcome => 2,
            ConnectionState::Joined => 3,
            ConnectionState::Failed => 4,
        }
    }

    /// Convert from u8 (atomic storage).
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::AwaitingWelcome,
            3 => ConnectionState::Joined,
            4 => ConnectionState::Failed,
            _ => ConnectionState::Disconnected,
        }
    }

    /// A transport is open or being opened.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::AwaitingWelcome | ConnectionState::Joined
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::AwaitingWelcome => write!(f, "awaiting welcome"),
            ConnectionState::Joined => write!(f, "joined"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle requests from the handle to the connection driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Connect,
    Disconnect,
    SetReconnect(bool),
}

/// Handle to manage connection lifecycle.
///
/// This is returned when creating a connection and allows:
/// - Querying connection state
/// - Requesting connect (idempotent) and disconnect
/// - Enabling or disabling automatic reconnection
///
/// Dropping every clone of the handle tears the connection down.
#[derive(Clone)]
pub struct ConnectionHandle {
    state: Arc<AtomicU8>,
    control: mpsc::UnboundedSender<Control>,
}

impl ConnectionHandle {
    /// Called by the bridge when spawning the connection task.
    pub fn new(state: Arc<AtomicU8>, control: mpsc::UnboundedSender<Control>) -> Self {
        Self { state, control }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_joined(&self) -> bool {
        self.state() == ConnectionState::Joined
    }

    /// Open the connection. A no-op while connecting or already open.
    pub fn connect(&self) {
        self.request(Control::Connect);
    }

    /// Intentional teardown: disables reconnection, then closes the transport.
    /// A later `connect()` turns reconnection back on unless the consumer
    /// switched it off with `set_reconnect_enabled(false)`.
    pub fn disconnect(&self) {
        self.request(Control::Disconnect);
    }

    pub fn set_reconnect_enabled(&self, enabled: bool) {
        self.request(Control::SetReconnect(enabled));
    }

    fn request(&self, control: Control) {
        if self.control.send(control).is_err() {
            tracing::debug!(?control, "Connection task already stopped");
        }
    }

    /// Get a clone of the state Arc for sharing with observers.
    pub fn state_arc(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.state)
    }
}

/// Observable connection state for UI binding.
///
/// Observes state changes without owning the ConnectionHandle. Multiple
/// observers can share the same underlying state.
#[derive(Clone)]
pub struct ConnectionStateObserver {
    state: Arc<AtomicU8>,
}

impl ConnectionStateObserver {
    pub fn from_handle(handle: &ConnectionHandle) -> Self {
        Self {
            state: handle.state_arc(),
        }
    }

    pub fn new(state: Arc<AtomicU8>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_joined(&self) -> bool {
        self.state() == ConnectionState::Joined
    }
}

/// Internal helper to update connection state (used by the driver).
pub fn set_connection_state(state_ref: &AtomicU8, new_state: ConnectionState) {
    state_ref.store(new_state.to_u8(), Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_roundtrip() {
        let states = [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::AwaitingWelcome,
            ConnectionState::Joined,
            ConnectionState::Failed,
        ];

        for state in states {
            assert_eq!(ConnectionState::from_u8(state.to_u8()), state);
        }
    }

    #[test]
    fn test_observer_reads_state() {
        let state = Arc::new(AtomicU8::new(ConnectionState::Disconnected.to_u8()));
        let observer = ConnectionStateObserver::new(Arc::clone(&state));

        assert_eq!(observer.state(), ConnectionState::Disconnected);
        assert!(!observer.is_joined());

        set_connection_state(&state, ConnectionState::Joined);

        assert_eq!(observer.state(), ConnectionState::Joined);
        assert!(observer.is_joined());
    }

    #[test]
    fn test_handle_forwards_control_requests() {
        let state = Arc::new(AtomicU8::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(state, tx);

        handle.connect();
        handle.set_reconnect_enabled(false);
        handle.disconnect();

        assert_eq!(rx.try_recv().ok(), Some(Control::Connect));
        assert_eq!(rx.try_recv().ok(), Some(Control::SetReconnect(false)));
        assert_eq!(rx.try_recv().ok(), Some(Control::Disconnect));
    }
}
