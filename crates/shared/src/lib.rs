//! Gridtalk Protocol - shared wire types for the world server and its clients
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde, serde_json, chrono and thiserror
//! 2. **No business logic** - Pure data types and serialization
//! 3. **Tolerant decoding** - one bad batch entry never drops its neighbours

pub mod events;
pub mod lenient;
pub mod messages;

use thiserror::Error;

pub use events::{EntityRecord, MapDimensions, WorldEvent};
pub use lenient::Lenient;
pub use messages::{parse_server_message, ClientMessage, ServerMessage};

/// A frame could not be encoded or decoded.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON frame: {0}")]
    Decode(#[from] serde_json::Error),
}
