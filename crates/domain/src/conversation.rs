//! Conversation state as carried on each entity.

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// Where an entity stands in the request / accept / talk / end cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    #[default]
    Idle,
    /// Either side of an unresolved request.
    PendingRequest,
    /// Request accepted; participants are closing the distance.
    WalkingToConversation,
    InConversation,
}

impl ConversationState {
    /// Whether the machine permits moving from `self` to `next`.
    ///
    /// Staying in the same state is always allowed. Once a conversation has been
    /// accepted the only way back to a new request is through `Idle`.
    pub fn can_transition_to(self, next: ConversationState) -> bool {
        use ConversationState::*;

        if self == next {
            return true;
        }
        match (self, next) {
            (Idle, _) => true,
            (PendingRequest, _) => true,
            (WalkingToConversation, InConversation | Idle) => true,
            (InConversation, Idle) => true,
            _ => false,
        }
    }

    pub fn is_idle(self) -> bool {
        self == ConversationState::Idle
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationState::Idle => write!(f, "IDLE"),
            ConversationState::PendingRequest => write!(f, "PENDING_REQUEST"),
            ConversationState::WalkingToConversation => write!(f, "WALKING_TO_CONVERSATION"),
            ConversationState::InConversation => write!(f, "IN_CONVERSATION"),
        }
    }
}

/// Conversation fields of a [`WorldEntity`](crate::WorldEntity).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityConversation {
    pub state: ConversationState,
    /// Set once a conversation has been accepted.
    pub partner_id: Option<EntityId>,
    /// Who an outstanding request is addressed to.
    pub target_id: Option<EntityId>,
}

impl EntityConversation {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn pending(target_id: EntityId) -> Self {
        Self {
            state: ConversationState::PendingRequest,
            partner_id: None,
            target_id: Some(target_id),
        }
    }

    pub fn walking(partner_id: EntityId) -> Self {
        Self {
            state: ConversationState::WalkingToConversation,
            partner_id: Some(partner_id),
            target_id: None,
        }
    }

    pub fn talking(partner_id: EntityId) -> Self {
        Self {
            state: ConversationState::InConversation,
            partner_id: Some(partner_id),
            target_id: None,
        }
    }

    /// Partner while walking to or holding a conversation.
    pub fn active_partner(&self) -> Option<&EntityId> {
        match self.state {
            ConversationState::WalkingToConversation | ConversationState::InConversation => {
                self.partner_id.as_ref()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConversationState::*;

    #[test]
    fn accepted_conversation_cannot_jump_back_to_pending() {
        assert!(!InConversation.can_transition_to(PendingRequest));
        assert!(!InConversation.can_transition_to(WalkingToConversation));
        assert!(!WalkingToConversation.can_transition_to(PendingRequest));
    }

    #[test]
    fn normal_cycle_is_allowed() {
        assert!(Idle.can_transition_to(PendingRequest));
        assert!(PendingRequest.can_transition_to(WalkingToConversation));
        assert!(WalkingToConversation.can_transition_to(InConversation));
        assert!(InConversation.can_transition_to(Idle));
        assert!(PendingRequest.can_transition_to(Idle));
    }

    #[test]
    fn wire_names_are_screaming_snake_case() {
        let json = serde_json::to_string(&WalkingToConversation).expect("serialize");
        assert_eq!(json, "\"WALKING_TO_CONVERSATION\"");
        assert_eq!(WalkingToConversation.to_string(), "WALKING_TO_CONVERSATION");
    }

    #[test]
    fn active_partner_only_after_acceptance() {
        let partner = EntityId::new("b");
        assert_eq!(EntityConversation::pending(partner.clone()).active_partner(), None);
        assert_eq!(
            EntityConversation::talking(partner.clone()).active_partner(),
            Some(&partner)
        );
    }
}
