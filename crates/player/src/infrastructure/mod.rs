//! Infrastructure layer - adapters for the world server connection and time.

pub mod clock;
pub mod messaging;
pub mod websocket;

pub use clock::SystemClock;
pub use messaging::{CommandBus, ConnectionHandle, ConnectionState, ConnectionStateObserver};
