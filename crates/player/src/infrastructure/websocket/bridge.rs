//! WebSocket Bridge - connects the CommandBus and event stream to the driver.
//!
//! This module provides the `create_connection` function that sets up:
//! - A CommandBus for sending commands
//! - An event receiver for inbound `ConnectionEvent`s
//! - A background task that owns the transport

use std::sync::atomic::AtomicU8;
use std::sync::Arc;
use std::time::Duration;

use gridtalk_shared::ClientMessage;
use tokio::sync::mpsc;
use url::Url;

use super::client::ConnectionDriver;
use super::core::{ConnectionCore, ConnectionEvent};
use super::message_builder::ClientMessageBuilder;
use super::transport::Connector;
use crate::config::{ClientConfig, ClientRole};
use crate::infrastructure::messaging::{
    CommandBus, ConnectionHandle, ConnectionState, ConnectionStateObserver,
};

/// Result of creating a connection.
///
/// Contains all the pieces needed to use the connection:
/// - `command_bus`: Send commands to the server
/// - `events`: Ordered stream of lifecycle changes and server messages
/// - `handle`: Control connection lifecycle
/// - `state_observer`: Observe connection state (for UI binding)
pub struct Connection {
    pub command_bus: CommandBus,
    pub events: mpsc::UnboundedReceiver<ConnectionEvent>,
    pub handle: ConnectionHandle,
    pub state_observer: ConnectionStateObserver,
}

/// Spawn the connection task for the configured role. Nothing is opened
/// until `handle.connect()` is called. Must be called inside a tokio runtime.
pub fn create_connection(config: &ClientConfig, connector: Arc<dyn Connector>) -> Connection {
    let join = match &config.role {
        ClientRole::Player(credentials) => Some(ClientMessageBuilder::join(credentials)),
        ClientRole::Observer => None,
    };
    spawn_connection(
        connector,
        config.ws_url.clone(),
        join,
        config.reconnect_delay,
    )
}

/// Lower-level constructor; `join = None` connects without a handshake.
pub fn spawn_connection(
    connector: Arc<dyn Connector>,
    url: Url,
    join: Option<ClientMessage>,
    reconnect_delay: Duration,
) -> Connection {
    let (command_bus, commands) = CommandBus::channel();
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (events_tx, events) = mpsc::unbounded_channel();
    let state = Arc::new(AtomicU8::new(ConnectionState::Disconnected.to_u8()));

    let driver = ConnectionDriver::new(
        ConnectionCore::new(join, reconnect_delay),
        connector,
        url,
        commands,
        control_rx,
        events_tx,
        Arc::clone(&state),
    );
    tokio::spawn(driver.run());

    let handle = ConnectionHandle::new(state, control_tx);
    let state_observer = ConnectionStateObserver::from_handle(&handle);

    Connection {
        command_bus,
        events,
        handle,
        state_observer,
    }
}
