//! Game session: the single event-processing timeline.
//!
//! Owns the world replica, the negotiation overlay, chat, movement and the
//! walkability grid, and applies connection events to them strictly in
//! arrival order. User operations go through here so the role and join
//! state are checked in one place.

use std::sync::Arc;

use gridtalk_domain::{
    ConversationId, Direction, EntityId, EntityKind, GridMap, GridPos, RequestId, WorldEntity,
};
use gridtalk_shared::{ServerMessage, WorldEvent};
use thiserror::Error;

use crate::application::services::chat_service::{
    ChatChannel, ChatConfig, ChatError, ChatMessage, IngestOutcome,
};
use crate::application::services::conversation_service::{
    ConversationNegotiator, ConversationRequest, NegotiationConfig, NegotiationError,
    NegotiationNotice,
};
use crate::application::services::movement_service::{
    MovementController, MovementError, PlanOutcome,
};
use crate::application::services::world_state::WorldStateStore;
use crate::config::RoleKind;
use crate::infrastructure::messaging::ConnectionState;
use crate::infrastructure::websocket::{ClientMessageBuilder, ConnectionEvent};
use crate::ports::outbound::{ClockPort, CommandSink, SendError};

/// What the user should be told about the link to the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Never joined yet.
    #[default]
    Offline,
    Online,
    /// Transient; a reconnect is scheduled or in progress.
    Reconnecting,
    /// The server refused the session; only the user can fix this.
    ActionRequired(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Not joined yet")]
    NotJoined,
    #[error(transparent)]
    Send(#[from] SendError),
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Movement(#[from] MovementError),
}

/// Something worth surfacing to the user, produced while handling events.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Joined { entity_id: EntityId },
    Connectivity(Connectivity),
    ServerError { message: String },
    Chat(ChatMessage),
    IncomingRequest(ConversationRequest),
    RequestAccepted { by: EntityId },
    RequestRejected { by: EntityId },
    ConversationStarted {
        conversation_id: ConversationId,
        partner_id: EntityId,
    },
    ConversationEnded { conversation_id: ConversationId },
}

pub struct GameSession {
    role: RoleKind,
    local_id: Option<EntityId>,
    sink: Arc<dyn CommandSink>,
    clock: Arc<dyn ClockPort>,
    world: WorldStateStore,
    grid: Option<GridMap>,
    negotiator: ConversationNegotiator,
    chat: ChatChannel,
    movement: MovementController,
    connectivity: Connectivity,
}

impl GameSession {
    pub fn new(role: RoleKind, sink: Arc<dyn CommandSink>, clock: Arc<dyn ClockPort>) -> Self {
        Self::with_config(
            role,
            sink,
            clock,
            NegotiationConfig::default(),
            ChatConfig::default(),
        )
    }

    pub fn with_config(
        role: RoleKind,
        sink: Arc<dyn CommandSink>,
        clock: Arc<dyn ClockPort>,
        negotiation: NegotiationConfig,
        chat: ChatConfig,
    ) -> Self {
        Self {
            role,
            local_id: None,
            sink,
            clock,
            world: WorldStateStore::new(),
            grid: None,
            negotiator: ConversationNegotiator::new(negotiation),
            chat: ChatChannel::new(chat),
            movement: MovementController::new(),
            connectivity: Connectivity::Offline,
        }
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Apply one connection event. Returns what the user should hear about.
    pub fn handle(&mut self, event: ConnectionEvent) -> Vec<Notice> {
        let mut notices = Vec::new();
        match event {
            ConnectionEvent::StateChanged(state) => {
                if let Some(next) = self.connectivity_for(state) {
                    self.set_connectivity(next, &mut notices);
                }
            }
            ConnectionEvent::Joined { entity_id } => {
                tracing::info!(%entity_id, "Joined world");
                self.local_id = Some(entity_id.clone());
                notices.push(Notice::Joined { entity_id });
            }
            ConnectionEvent::ServerError { message, terminal } => {
                if terminal {
                    self.set_connectivity(Connectivity::ActionRequired(message.clone()), &mut notices);
                } else if let Some(local) = self.local_id.as_ref() {
                    // A refused REQUEST_CONVERSATION is answered only by ERROR.
                    self.negotiator.drop_unconfirmed(local);
                }
                notices.push(Notice::ServerError { message });
            }
            ConnectionEvent::Message(message) => self.handle_message(message, &mut notices),
        }
        notices
    }

    fn connectivity_for(&self, state: ConnectionState) -> Option<Connectivity> {
        match (state, &self.connectivity) {
            (_, Connectivity::ActionRequired(_)) => None,
            (ConnectionState::Joined, _) => Some(Connectivity::Online),
            (ConnectionState::Disconnected, Connectivity::Online) => Some(Connectivity::Reconnecting),
            _ => None,
        }
    }

    fn set_connectivity(&mut self, next: Connectivity, notices: &mut Vec<Notice>) {
        if self.connectivity != next {
            self.connectivity = next.clone();
            notices.push(Notice::Connectivity(next));
        }
    }

    fn handle_message(&mut self, message: ServerMessage, notices: &mut Vec<Notice>) {
        let now = self.clock.now();
        match &message {
            ServerMessage::Snapshot { .. } => {
                self.world.apply(&message);
                self.rebuild_grid();
                self.negotiator.reconcile(&self.world, self.local_id.as_ref());
            }
            ServerMessage::Events { events } => {
                self.world.apply(&message);

                let mut walls_changed = false;
                for event in events.iter().filter_map(|e| e.parsed()) {
                    walls_changed |= touches_walls(event);
                    if let Some(notice) =
                        self.negotiator.observe(event, self.local_id.as_ref(), now)
                    {
                        notices.extend(self.negotiation_notice(notice));
                    }
                    self.conversation_lifecycle(event, notices);
                }

                if walls_changed {
                    self.rebuild_grid();
                }
                self.negotiator.reconcile(&self.world, self.local_id.as_ref());
            }
            ServerMessage::ChatMessage { .. } => {
                if let Some(chat) = ChatMessage::from_server(&message) {
                    let outcome = self.chat.ingest(
                        chat.clone(),
                        &self.world,
                        self.local_id.as_ref(),
                        now,
                    );
                    if outcome != IngestOutcome::Duplicate {
                        notices.push(Notice::Chat(chat));
                    }
                }
            }
            ServerMessage::Welcome { .. } | ServerMessage::Error { .. } | ServerMessage::Unknown => {}
        }
    }

    fn negotiation_notice(&self, notice: NegotiationNotice) -> Option<Notice> {
        let local = self.local_id.as_ref()?;
        match notice {
            NegotiationNotice::IncomingRequest(request) => Some(Notice::IncomingRequest(request)),
            NegotiationNotice::Accepted {
                initiator_id,
                target_id,
            } => (&initiator_id == local).then_some(Notice::RequestAccepted { by: target_id }),
            NegotiationNotice::Rejected {
                initiator_id,
                target_id,
                ..
            } => (&initiator_id == local).then_some(Notice::RequestRejected { by: target_id }),
        }
    }

    fn conversation_lifecycle(&mut self, event: &WorldEvent, notices: &mut Vec<Notice>) {
        let Some(local) = self.local_id.clone() else {
            return;
        };
        match event {
            WorldEvent::ConversationStarted {
                conversation_id,
                participant1_id,
                participant2_id,
            } if event.involves(&local) => {
                let partner_id = if participant1_id == &local {
                    participant2_id.clone()
                } else {
                    participant1_id.clone()
                };
                if let Err(e) = self.movement.cancel(self.sink.as_ref()) {
                    tracing::warn!(error = %e, "Failed to stop before conversation");
                }
                notices.push(Notice::ConversationStarted {
                    conversation_id: conversation_id.clone(),
                    partner_id,
                });
            }
            WorldEvent::ConversationEnded {
                conversation_id, ..
            } if event.involves(&local) => {
                self.chat.invalidate(conversation_id);
                notices.push(Notice::ConversationEnded {
                    conversation_id: conversation_id.clone(),
                });
            }
            _ => {}
        }
    }

    /// Static grid from the snapshot dimensions plus WALL entities.
    fn rebuild_grid(&mut self) {
        let Some(map) = self.world.map() else {
            return;
        };
        self.grid = match GridMap::new(map.width, map.height) {
            Ok(grid) => Some(grid.with_blocked(self.world.wall_cells())),
            Err(e) => {
                tracing::warn!(error = %e, "Unusable map dimensions");
                None
            }
        };
    }

    // =========================================================================
    // User operations
    // =========================================================================

    fn actor(&self) -> Result<EntityId, SessionError> {
        if self.role == RoleKind::Observer {
            return Err(SendError::ReadOnly.into());
        }
        self.local_id.clone().ok_or(SessionError::NotJoined)
    }

    pub fn request_conversation(&mut self, target: &EntityId) -> Result<(), SessionError> {
        let local = self.actor()?;
        let now = self.clock.now();
        self.negotiator
            .request(&self.world, self.sink.as_ref(), &local, target, now)?;
        Ok(())
    }

    pub fn accept_request(&mut self, request_id: &RequestId) -> Result<(), SessionError> {
        self.actor()?;
        self.negotiator.accept(self.sink.as_ref(), request_id)?;
        Ok(())
    }

    pub fn reject_request(&mut self, request_id: &RequestId) -> Result<(), SessionError> {
        self.actor()?;
        self.negotiator.reject(self.sink.as_ref(), request_id)?;
        Ok(())
    }

    pub fn end_conversation(&mut self) -> Result<(), SessionError> {
        let local = self.actor()?;
        self.negotiator
            .end(&self.world, self.sink.as_ref(), &local)?;
        Ok(())
    }

    pub fn say(&mut self, content: &str) -> Result<(), SessionError> {
        self.actor()?;
        let message = self.chat.compose(content)?;
        self.sink.send(message).map_err(ChatError::from)?;
        Ok(())
    }

    pub fn set_direction(&mut self, direction: Direction) -> Result<(), SessionError> {
        self.actor()?;
        self.movement
            .set_direction(self.sink.as_ref(), direction)?;
        Ok(())
    }

    pub fn move_to(&mut self, goal: GridPos) -> Result<PlanOutcome, SessionError> {
        let local = self.actor()?;
        let grid = self.grid.as_ref().ok_or(MovementError::NoMap)?;
        Ok(self
            .movement
            .plan_to(self.sink.as_ref(), grid, &self.world, &local, goal)?)
    }

    pub fn respawn(&mut self) -> Result<(), SessionError> {
        self.actor()?;
        self.movement.cancel(self.sink.as_ref())?;
        self.sink.send(ClientMessageBuilder::respawn())?;
        Ok(())
    }

    /// Periodic step: follow the path, prune cooldowns, expire bubbles.
    pub fn tick(&mut self) -> Result<(), SessionError> {
        let now = self.clock.now();
        self.negotiator.prune_expired(now);
        self.chat.sweep(now);

        if self.role == RoleKind::Observer {
            return Ok(());
        }
        if let Some(position) = self.local_entity().map(|e| e.position) {
            self.movement.tick(self.sink.as_ref(), position)?;
        }
        Ok(())
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn role(&self) -> RoleKind {
        self.role
    }

    pub fn local_id(&self) -> Option<&EntityId> {
        self.local_id.as_ref()
    }

    pub fn local_entity(&self) -> Option<&WorldEntity> {
        self.local_id.as_ref().and_then(|id| self.world.get(id))
    }

    pub fn world(&self) -> &WorldStateStore {
        &self.world
    }

    pub fn grid(&self) -> Option<&GridMap> {
        self.grid.as_ref()
    }

    pub fn negotiator(&self) -> &ConversationNegotiator {
        &self.negotiator
    }

    pub fn chat(&self) -> &ChatChannel {
        &self.chat
    }

    pub fn movement(&self) -> &MovementController {
        &self.movement
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Incoming requests with their stale flag, as of now.
    pub fn incoming_requests(&self) -> Vec<(&ConversationRequest, bool)> {
        self.negotiator.incoming_requests(self.clock.now())
    }
}

fn touches_walls(event: &WorldEvent) -> bool {
    match event {
        WorldEvent::EntityJoined { entity } => entity.kind == EntityKind::Wall,
        // A departed wall is already gone from the store; rebuild regardless.
        WorldEvent::EntityLeft { .. } => true,
        _ => false,
    }
}
