//! World records and incremental events carried by `SNAPSHOT` and `EVENTS`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridtalk_domain::{
    ConversationId, ConversationState, EntityConversation, EntityId, EntityKind, Facing, GridPos,
    RequestId, Vitals, VitalsPatch, WorldEntity,
};

/// Full description of one entity as sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    #[serde(alias = "id")]
    pub entity_id: EntityId,
    #[serde(default)]
    pub kind: EntityKind,
    #[serde(default)]
    pub display_name: String,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub facing: Facing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprites: Option<String>,
    #[serde(default)]
    pub conversation_state: ConversationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_partner_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_target_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<VitalsPatch>,
}

impl EntityRecord {
    /// Minimal record: an idle player at `(x, y)`.
    pub fn new(entity_id: impl Into<EntityId>, x: i32, y: i32) -> Self {
        Self {
            entity_id: entity_id.into(),
            kind: EntityKind::Player,
            display_name: String::new(),
            x,
            y,
            facing: Facing::None,
            sprites: None,
            conversation_state: ConversationState::Idle,
            conversation_partner_id: None,
            conversation_target_id: None,
            stats: None,
        }
    }

    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_conversation(
        mut self,
        state: ConversationState,
        partner_id: Option<EntityId>,
        target_id: Option<EntityId>,
    ) -> Self {
        self.conversation_state = state;
        self.conversation_partner_id = partner_id;
        self.conversation_target_id = target_id;
        self
    }

    pub fn into_entity(self) -> WorldEntity {
        let vitals = self.stats.map(|patch| {
            let mut vitals = Vitals::default();
            vitals.apply(&patch);
            vitals
        });

        WorldEntity {
            id: self.entity_id,
            kind: self.kind,
            display_name: self.display_name,
            position: GridPos::new(self.x, self.y),
            facing: self.facing,
            sprites: self.sprites,
            conversation: EntityConversation {
                state: self.conversation_state,
                partner_id: self.conversation_partner_id,
                target_id: self.conversation_target_id,
            },
            vitals,
        }
    }
}

/// Map dimensions included in every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDimensions {
    pub width: u32,
    pub height: u32,
}

/// One incremental change since the last snapshot.
///
/// Events are applied strictly in delivery order. Unknown event types map to
/// [`WorldEvent::Unknown`] so newer servers don't break older clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum WorldEvent {
    EntityJoined {
        entity: EntityRecord,
    },
    EntityLeft {
        entity_id: EntityId,
    },
    EntityMoved {
        entity_id: EntityId,
        x: i32,
        y: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        facing: Option<Facing>,
    },
    EntityTurned {
        entity_id: EntityId,
        facing: Facing,
    },
    EntityStateChanged {
        entity_id: EntityId,
        conversation_state: ConversationState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_target_id: Option<EntityId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_partner_id: Option<EntityId>,
    },
    EntityStatsUpdated {
        entity_id: EntityId,
        stats: VitalsPatch,
    },
    ConversationRequested {
        request_id: RequestId,
        initiator_id: EntityId,
        target_id: EntityId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initiator_name: Option<String>,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        expires_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    ConversationAccepted {
        request_id: RequestId,
        initiator_id: EntityId,
        target_id: EntityId,
    },
    ConversationRejected {
        request_id: RequestId,
        initiator_id: EntityId,
        target_id: EntityId,
        #[serde(
            default,
            with = "chrono::serde::ts_milliseconds_option",
            skip_serializing_if = "Option::is_none"
        )]
        cooldown_until: Option<DateTime<Utc>>,
    },
    ConversationStarted {
        conversation_id: ConversationId,
        participant1_id: EntityId,
        participant2_id: EntityId,
    },
    ConversationEnded {
        conversation_id: ConversationId,
        participant1_id: EntityId,
        participant2_id: EntityId,
    },

    /// Unknown event type for forward compatibility
    #[serde(other)]
    Unknown,
}

impl WorldEvent {
    /// Wire name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            WorldEvent::EntityJoined { .. } => "ENTITY_JOINED",
            WorldEvent::EntityLeft { .. } => "ENTITY_LEFT",
            WorldEvent::EntityMoved { .. } => "ENTITY_MOVED",
            WorldEvent::EntityTurned { .. } => "ENTITY_TURNED",
            WorldEvent::EntityStateChanged { .. } => "ENTITY_STATE_CHANGED",
            WorldEvent::EntityStatsUpdated { .. } => "ENTITY_STATS_UPDATED",
            WorldEvent::ConversationRequested { .. } => "CONVERSATION_REQUESTED",
            WorldEvent::ConversationAccepted { .. } => "CONVERSATION_ACCEPTED",
            WorldEvent::ConversationRejected { .. } => "CONVERSATION_REJECTED",
            WorldEvent::ConversationStarted { .. } => "CONVERSATION_STARTED",
            WorldEvent::ConversationEnded { .. } => "CONVERSATION_ENDED",
            WorldEvent::Unknown => "UNKNOWN",
        }
    }

    /// True if `id` takes part in this conversation event.
    pub fn involves(&self, id: &EntityId) -> bool {
        match self {
            WorldEvent::ConversationRequested {
                initiator_id,
                target_id,
                ..
            }
            | WorldEvent::ConversationAccepted {
                initiator_id,
                target_id,
                ..
            }
            | WorldEvent::ConversationRejected {
                initiator_id,
                target_id,
                ..
            } => initiator_id == id || target_id == id,
            WorldEvent::ConversationStarted {
                participant1_id,
                participant2_id,
                ..
            }
            | WorldEvent::ConversationEnded {
                participant1_id,
                participant2_id,
                ..
            } => participant1_id == id || participant2_id == id,
            _ => false,
        }
    }
}
