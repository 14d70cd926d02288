//! Application layer: world replica, negotiation, chat, movement and the
//! session that ties them to the connection.

pub mod services;

pub use services::*;
