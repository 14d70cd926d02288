//! Platform-agnostic core logic for the world server connection.
//!
//! This is deliberately free of any runtime dependencies (tokio, sockets).
//! The driver owns the actual transport and calls into this core for the
//! handshake, reconnect and terminal-error rules.

use std::time::Duration;

use gridtalk_domain::EntityId;
use gridtalk_shared::{ClientMessage, ServerMessage};

use crate::infrastructure::messaging::ConnectionState;

/// Server error text marking a duplicate session. Matched case-insensitively.
const DUPLICATE_SESSION_MARKER: &str = "already connected";

/// What the connection delivers to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    /// Handshake finished; the server assigned this entity to us
    Joined { entity_id: EntityId },
    Message(ServerMessage),
    ServerError { message: String, terminal: bool },
}

/// Whether a server error permanently rules out reconnecting.
pub fn is_terminal_error(message: &str) -> bool {
    message.to_ascii_lowercase().contains(DUPLICATE_SESSION_MARKER)
}

/// Handshake and reconnection state machine.
#[derive(Debug)]
pub struct ConnectionCore {
    /// `None` for the observer role, which joins without a handshake.
    join: Option<ClientMessage>,
    state: ConnectionState,
    reconnect_delay: Duration,
    reconnect_enabled: bool,
    terminal: bool,
    /// Sticky from the first WELCOME until an explicit disconnect, so a
    /// reconnect attempt that fails to open keeps retrying.
    has_joined: bool,
    /// Reconnect was switched off by `disconnect`, not by the consumer;
    /// the next `begin_connect` switches it back on.
    reconnect_suspended: bool,
}

impl ConnectionCore {
    pub fn new(join: Option<ClientMessage>, reconnect_delay: Duration) -> Self {
        Self {
            join,
            state: ConnectionState::Disconnected,
            reconnect_delay,
            reconnect_enabled: true,
            terminal: false,
            has_joined: false,
            reconnect_suspended: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect_enabled
    }

    /// Returns false (and changes nothing) unless currently disconnected.
    pub fn begin_connect(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected {
            return false;
        }
        self.state = ConnectionState::Connecting;
        if self.reconnect_suspended && !self.terminal {
            self.reconnect_enabled = true;
        }
        self.reconnect_suspended = false;
        true
    }

    /// Transport opened. Returns the JOIN to send, if this role handshakes.
    pub fn on_open(&mut self) -> Option<ClientMessage> {
        if self.state != ConnectionState::Connecting {
            return None;
        }
        match &self.join {
            Some(join) => {
                self.state = ConnectionState::AwaitingWelcome;
                Some(join.clone())
            }
            None => {
                self.state = ConnectionState::Joined;
                self.has_joined = true;
                None
            }
        }
    }

    pub fn on_message(&mut self, message: &ServerMessage) -> Vec<ConnectionEvent> {
        match message {
            ServerMessage::Welcome { entity_id } => {
                if self.state != ConnectionState::AwaitingWelcome {
                    tracing::warn!(state = %self.state, "Ignoring WELCOME outside the handshake");
                    return Vec::new();
                }
                self.state = ConnectionState::Joined;
                self.has_joined = true;
                vec![ConnectionEvent::Joined {
                    entity_id: entity_id.clone(),
                }]
            }
            ServerMessage::Error { error } => {
                let terminal = is_terminal_error(error);
                if terminal {
                    self.terminal = true;
                    self.reconnect_enabled = false;
                    self.state = ConnectionState::Failed;
                }
                vec![ConnectionEvent::ServerError {
                    message: error.clone(),
                    terminal,
                }]
            }
            other => match self.state {
                ConnectionState::AwaitingWelcome | ConnectionState::Joined => {
                    vec![ConnectionEvent::Message(other.clone())]
                }
                state => {
                    tracing::debug!(message = other.kind(), %state, "Dropping message while not connected");
                    Vec::new()
                }
            },
        }
    }

    /// Transport closed or failed to open. Returns the delay before the
    /// next attempt when one should be made.
    pub fn on_close(&mut self) -> Option<Duration> {
        if self.state == ConnectionState::Failed {
            return None;
        }
        self.state = ConnectionState::Disconnected;
        if self.reconnect_enabled && self.has_joined && !self.terminal {
            Some(self.reconnect_delay)
        } else {
            None
        }
    }

    /// Cannot re-enable after a terminal error.
    pub fn set_reconnect_enabled(&mut self, enabled: bool) {
        self.reconnect_enabled = enabled && !self.terminal;
        self.reconnect_suspended = false;
    }

    /// Intentional teardown. Reconnect stays off until the next connect.
    pub fn disconnect(&mut self) {
        self.reconnect_suspended |= self.reconnect_enabled;
        self.reconnect_enabled = false;
        self.has_joined = false;
        if self.state != ConnectionState::Failed {
            self.state = ConnectionState::Disconnected;
        }
    }
}
