//! Command Port - fire-and-forget delivery of client commands to the server.
//!
//! Sends never wait for an acknowledgement; the effect of a command is only
//! ever observed through the inbound event stream.

use gridtalk_shared::ClientMessage;
use thiserror::Error;

/// Why a command could not be queued for sending.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("Connection command channel is closed")]
    Closed,
    #[error("Connection command channel is full")]
    Full,
    #[error("Observer connections are read-only")]
    ReadOnly,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CommandSink: Send + Sync {
    /// Queue a message for the server.
    fn send(&self, message: ClientMessage) -> Result<(), SendError>;
}
