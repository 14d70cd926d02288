//! Chat routing: a conversation transcript and ambient speech bubbles.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use gridtalk_domain::{ConversationId, EntityId, MessageId};
use gridtalk_shared::{ClientMessage, ServerMessage};
use thiserror::Error;

use crate::application::services::world_state::WorldStateStore;
use crate::infrastructure::websocket::ClientMessageBuilder;
use crate::ports::outbound::SendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatConfig {
    pub bubble_ttl: Duration,
    /// In characters, after trimming.
    pub max_message_len: usize,
    /// How long a message id is remembered for duplicate suppression.
    pub dedup_retention: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bubble_ttl: Duration::milliseconds(5_000),
            max_message_len: 500,
            dedup_retention: Duration::minutes(10),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Message is empty")]
    Empty,
    #[error("Message is {len} characters; the limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error(transparent)]
    Send(#[from] SendError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender_id: EntityId,
    pub sender_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub conversation_id: Option<ConversationId>,
}

impl ChatMessage {
    /// Lift a CHAT_MESSAGE frame; `None` for any other message.
    pub fn from_server(message: &ServerMessage) -> Option<Self> {
        match message {
            ServerMessage::ChatMessage {
                message_id,
                sender_id,
                sender_name,
                content,
                timestamp,
                conversation_id,
            } => Some(Self {
                id: message_id.clone(),
                sender_id: sender_id.clone(),
                sender_name: sender_name.clone(),
                content: content.clone(),
                timestamp: *timestamp,
                conversation_id: conversation_id.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub message: ChatMessage,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Already seen this message id.
    Duplicate,
    Stored { in_transcript: bool },
}

#[derive(Debug, Default)]
pub struct ChatChannel {
    config: ChatConfig,
    /// Message id -> when it was first ingested.
    seen: HashMap<MessageId, DateTime<Utc>>,
    transcript: Vec<ChatMessage>,
    bubbles: HashMap<EntityId, Bubble>,
}

impl ChatChannel {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Store a message once. Transcript membership is decided now, against
    /// the local entity's current partner.
    pub fn ingest(
        &mut self,
        message: ChatMessage,
        world: &WorldStateStore,
        local: Option<&EntityId>,
        now: DateTime<Utc>,
    ) -> IngestOutcome {
        if self.seen.contains_key(&message.id) {
            tracing::trace!(message_id = %message.id, "Duplicate chat message");
            return IngestOutcome::Duplicate;
        }
        self.seen.insert(message.id.clone(), now);

        let partner = local
            .and_then(|id| world.get(id))
            .and_then(|me| me.conversation.active_partner());
        let in_transcript =
            Some(&message.sender_id) == local || Some(&message.sender_id) == partner;

        let supersedes = self
            .bubbles
            .get(&message.sender_id)
            .map_or(true, |b| b.message.timestamp <= message.timestamp);
        if supersedes {
            self.bubbles.insert(
                message.sender_id.clone(),
                Bubble {
                    message: message.clone(),
                    expires_at: now + self.config.bubble_ttl,
                },
            );
        }

        if in_transcript {
            self.transcript.push(message);
        }
        IngestOutcome::Stored { in_transcript }
    }

    /// Drop transcript lines tied to an ended conversation, including lines
    /// that carried no conversation id.
    pub fn invalidate(&mut self, conversation_id: &ConversationId) {
        let before = self.transcript.len();
        self.transcript
            .retain(|m| m.conversation_id.as_ref().is_some_and(|c| c != conversation_id));
        tracing::debug!(
            %conversation_id,
            dropped = before - self.transcript.len(),
            "Transcript invalidated"
        );
    }

    /// Expire bubbles and forget message ids past the dedup retention.
    /// Returns how many bubbles were removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let retention = self.config.dedup_retention;
        self.seen.retain(|_, first_seen| now - *first_seen < retention);

        let before = self.bubbles.len();
        self.bubbles.retain(|_, b| b.expires_at > now);
        before - self.bubbles.len()
    }

    pub fn remembered_ids(&self) -> usize {
        self.seen.len()
    }

    /// Validate outgoing text and build the CHAT_MESSAGE for it.
    pub fn compose(&self, content: &str) -> Result<ClientMessage, ChatError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ChatError::Empty);
        }
        let len = trimmed.chars().count();
        if len > self.config.max_message_len {
            return Err(ChatError::TooLong {
                len,
                max: self.config.max_message_len,
            });
        }
        Ok(ClientMessageBuilder::chat(trimmed))
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn bubble(&self, sender: &EntityId) -> Option<&Bubble> {
        self.bubbles.get(sender)
    }

    pub fn bubbles(&self) -> impl Iterator<Item = &Bubble> {
        self.bubbles.values()
    }
}
