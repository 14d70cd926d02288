//! Gridtalk Player - client for the shared grid world.
//!
//! - `infrastructure`: WebSocket connection, command bus, clock
//! - `application`: world replica, conversation negotiation, chat, movement
//! - `ports`: trait seams between the two
//! - `input`: line-oriented commands for the headless binary

pub mod application;
pub mod config;
pub mod infrastructure;
pub mod input;
pub mod ports;

pub use application::{Connectivity, GameSession, Notice, SessionError};
pub use config::{ClientConfig, ClientRole, ConfigError, RoleKind};
pub use infrastructure::websocket::{create_connection, Connection, ConnectionEvent, WsConnector};
