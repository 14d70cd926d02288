//! Command bus and connection lifecycle messaging.
//!
//! - `CommandBus`: send commands to the server (fire-and-forget)
//! - `ConnectionHandle`: manage connection lifecycle
//! - `ConnectionStateObserver`: read-only view of the connection state
//!
//! The WebSocket bridge (in the websocket module) connects these to the actual transport.

pub mod command_bus;
pub mod connection;

pub use command_bus::CommandBus;
pub use connection::{
    set_connection_state, ConnectionHandle, ConnectionState, ConnectionStateObserver, Control,
};
