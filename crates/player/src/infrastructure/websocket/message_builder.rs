//! ClientMessage builder for the player application
//!
//! Centralizes construction of ClientMessage variants so application code
//! speaks in domain types and never assembles wire payloads by hand.

use gridtalk_domain::{Direction, EntityId, RequestId};
use gridtalk_shared::ClientMessage;

use crate::config::JoinCredentials;

/// Builder for ClientMessage variants
///
/// # Usage
///
/// ```rust,ignore
/// use crate::infrastructure::websocket::ClientMessageBuilder;
///
/// let msg = ClientMessageBuilder::request_conversation(&target_id);
/// sink.send(msg)?;
/// ```
pub struct ClientMessageBuilder;

impl ClientMessageBuilder {
    // =========================================================================
    // Session
    // =========================================================================

    /// Create the JOIN handshake message
    pub fn join(credentials: &JoinCredentials) -> ClientMessage {
        ClientMessage::Join {
            token: credentials.token.clone(),
            user_id: credentials.user_id.clone(),
            display_name: credentials.display_name.clone(),
        }
    }

    pub fn respawn() -> ClientMessage {
        ClientMessage::Respawn
    }

    // =========================================================================
    // Movement
    // =========================================================================

    /// Create a SetDirection message; `Direction::STOP` halts the entity
    pub fn set_direction(direction: Direction) -> ClientMessage {
        ClientMessage::SetDirection {
            dx: direction.dx(),
            dy: direction.dy(),
        }
    }

    // =========================================================================
    // Conversation
    // =========================================================================

    pub fn request_conversation(target: &EntityId) -> ClientMessage {
        ClientMessage::RequestConversation {
            target_entity_id: target.clone(),
        }
    }

    pub fn accept_conversation(request_id: &RequestId) -> ClientMessage {
        ClientMessage::AcceptConversation {
            request_id: request_id.clone(),
        }
    }

    pub fn reject_conversation(request_id: &RequestId) -> ClientMessage {
        ClientMessage::RejectConversation {
            request_id: request_id.clone(),
        }
    }

    pub fn end_conversation() -> ClientMessage {
        ClientMessage::EndConversation
    }

    /// Create a ChatMessage; content is expected to be validated already
    pub fn chat(content: impl Into<String>) -> ClientMessage {
        ClientMessage::ChatMessage {
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridtalk_domain::UserId;

    #[test]
    fn join_copies_credentials() {
        let creds = JoinCredentials {
            token: "tok".into(),
            user_id: UserId::new("u1"),
            display_name: "Ada".into(),
        };
        assert_eq!(
            ClientMessageBuilder::join(&creds),
            ClientMessage::Join {
                token: "tok".into(),
                user_id: UserId::new("u1"),
                display_name: "Ada".into(),
            }
        );
    }

    #[test]
    fn set_direction_uses_components() {
        let dir = Direction::new(-1, 0).expect("valid");
        assert_eq!(
            ClientMessageBuilder::set_direction(dir),
            ClientMessage::SetDirection { dx: -1, dy: 0 }
        );
        assert_eq!(
            ClientMessageBuilder::set_direction(Direction::STOP),
            ClientMessage::SetDirection { dx: 0, dy: 0 }
        );
    }
}
