//! WebSocket connection to the world server
//!
//! - `core`: runtime-free handshake and reconnection state machine
//! - `client`: tokio driver that runs the core against a transport
//! - `transport`: `Connector` seam and the tokio-tungstenite implementation
//! - `bridge`: `create_connection`, wiring the bus and handle to the driver
//! - `message_builder`: ClientMessage construction from domain types

mod bridge;
mod client;
mod core;
mod message_builder;
mod transport;

pub use bridge::{create_connection, spawn_connection, Connection};
pub use client::ConnectionDriver;
pub use core::{is_terminal_error, ConnectionCore, ConnectionEvent};
pub use message_builder::ClientMessageBuilder;
pub use transport::{Connector, Transport, TransportError, WsConnector};
