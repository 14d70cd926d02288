//! Command Bus for sending messages to the world server.
//!
//! The CommandBus is the single outbound path: application components queue
//! fire-and-forget commands here and the connection driver writes them to
//! the transport in queue order.

use gridtalk_shared::ClientMessage;
use tokio::sync::mpsc;

use crate::ports::outbound::{CommandSink, SendError};

/// Bounded queue depth between the bus and the connection driver.
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Command bus for sending messages to the world server.
///
/// Cheap to clone; every clone feeds the same driver.
#[derive(Clone)]
pub struct CommandBus {
    tx: mpsc::Sender<ClientMessage>,
}

impl CommandBus {
    /// Create a new CommandBus with the given channel sender.
    pub fn new(tx: mpsc::Sender<ClientMessage>) -> Self {
        Self { tx }
    }

    /// Create a bus plus the receiving end the driver consumes.
    pub fn channel() -> (Self, mpsc::Receiver<ClientMessage>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        (Self::new(tx), rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl CommandSink for CommandBus {
    /// Returns immediately after queueing the message.
    fn send(&self, message: ClientMessage) -> Result<(), SendError> {
        let kind = message.kind();
        self.tx.try_send(message).map_err(|e| {
            tracing::warn!(message = kind, error = %e, "CommandBus send failed");
            match e {
                mpsc::error::TrySendError::Full(_) => SendError::Full,
                mpsc::error::TrySendError::Closed(_) => SendError::Closed,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_queues_in_order() {
        let (bus, mut rx) = CommandBus::channel();

        bus.send(ClientMessage::Respawn).expect("send");
        bus.send(ClientMessage::EndConversation).expect("send");

        assert_eq!(rx.recv().await, Some(ClientMessage::Respawn));
        assert_eq!(rx.recv().await, Some(ClientMessage::EndConversation));
    }

    #[tokio::test]
    async fn test_send_after_driver_gone_is_closed() {
        let (bus, rx) = CommandBus::channel();
        drop(rx);

        assert!(bus.is_closed());
        assert_eq!(bus.send(ClientMessage::Respawn), Err(SendError::Closed));
    }

    #[tokio::test]
    async fn test_full_queue_reports_full() {
        let (tx, _rx) = mpsc::channel(1);
        let bus = CommandBus::new(tx);

        bus.send(ClientMessage::Respawn).expect("first fits");
        assert_eq!(bus.send(ClientMessage::Respawn), Err(SendError::Full));
    }
}
