//! WebSocket message types for server-client communication
//!
//! Every frame is a JSON object tagged by `"type"` (SCREAMING_SNAKE_CASE)
//! with camelCase payload fields.
//!
//! ## Versioning Policy
//!
//! - New variants can be added at the end (forward compatible)
//! - Renaming variants is a breaking change
//! - Unknown message types deserialize to `Unknown` for forward compatibility

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridtalk_domain::{ConversationId, EntityId, MessageId, RequestId, UserId};

use crate::events::{EntityRecord, MapDimensions, WorldEvent};
use crate::lenient::Lenient;
use crate::ProtocolError;

// =============================================================================
// Client Messages (Player → Server)
// =============================================================================

/// Messages from a client to the world server
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Handshake sent right after the transport opens
    Join {
        token: String,
        user_id: UserId,
        display_name: String,
    },
    /// Movement intent; each component is -1, 0 or 1
    SetDirection { dx: i8, dy: i8 },
    RequestConversation { target_entity_id: EntityId },
    AcceptConversation { request_id: RequestId },
    RejectConversation { request_id: RequestId },
    EndConversation,
    ChatMessage { content: String },
    Respawn,
}

impl ClientMessage {
    /// Wire name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "JOIN",
            ClientMessage::SetDirection { .. } => "SET_DIRECTION",
            ClientMessage::RequestConversation { .. } => "REQUEST_CONVERSATION",
            ClientMessage::AcceptConversation { .. } => "ACCEPT_CONVERSATION",
            ClientMessage::RejectConversation { .. } => "REJECT_CONVERSATION",
            ClientMessage::EndConversation => "END_CONVERSATION",
            ClientMessage::ChatMessage { .. } => "CHAT_MESSAGE",
            ClientMessage::Respawn => "RESPAWN",
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

// Join carries a credential; keep it out of logs.
impl std::fmt::Debug for ClientMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientMessage::Join {
                user_id,
                display_name,
                ..
            } => f
                .debug_struct("Join")
                .field("token", &"<redacted>")
                .field("user_id", user_id)
                .field("display_name", display_name)
                .finish(),
            ClientMessage::SetDirection { dx, dy } => f
                .debug_struct("SetDirection")
                .field("dx", dx)
                .field("dy", dy)
                .finish(),
            ClientMessage::RequestConversation { target_entity_id } => f
                .debug_struct("RequestConversation")
                .field("target_entity_id", target_entity_id)
                .finish(),
            ClientMessage::AcceptConversation { request_id } => f
                .debug_struct("AcceptConversation")
                .field("request_id", request_id)
                .finish(),
            ClientMessage::RejectConversation { request_id } => f
                .debug_struct("RejectConversation")
                .field("request_id", request_id)
                .finish(),
            ClientMessage::EndConversation => f.write_str("EndConversation"),
            ClientMessage::ChatMessage { content } => f
                .debug_struct("ChatMessage")
                .field("content", content)
                .finish(),
            ClientMessage::Respawn => f.write_str("Respawn"),
        }
    }
}

// =============================================================================
// Server Messages (Server → Player)
// =============================================================================

/// Messages from the world server to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Handshake accepted; carries the entity this client controls
    Welcome { entity_id: EntityId },
    /// Full replacement of world state
    Snapshot {
        map: MapDimensions,
        entities: Vec<Lenient<EntityRecord>>,
    },
    /// Ordered batch of incremental changes
    Events { events: Vec<Lenient<WorldEvent>> },
    ChatMessage {
        message_id: MessageId,
        sender_id: EntityId,
        #[serde(default)]
        sender_name: String,
        content: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<ConversationId>,
    },
    Error { error: String },

    /// Unknown message type for forward compatibility
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Wire name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "WELCOME",
            ServerMessage::Snapshot { .. } => "SNAPSHOT",
            ServerMessage::Events { .. } => "EVENTS",
            ServerMessage::ChatMessage { .. } => "CHAT_MESSAGE",
            ServerMessage::Error { .. } => "ERROR",
            ServerMessage::Unknown => "UNKNOWN",
        }
    }
}

/// Decode one inbound text frame.
pub fn parse_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}
