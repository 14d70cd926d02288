//! Conversation negotiation: local guards plus a thin overlay of what the
//! event stream has told us about requests and cooldowns.
//!
//! The negotiator never touches entity state. Whether someone is actually
//! pending, walking or talking is read from [`WorldStateStore`]; the overlay
//! only remembers what entity state cannot express:
//! - outgoing requests still awaiting resolution, per ordered pair
//! - incoming requests addressed to the local entity
//! - rejection cooldowns, per ordered pair
//!
//! Overlay entries are cleared by authoritative events, never by local
//! timers. An incoming request's `expires_at` only marks it stale for display.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use gridtalk_domain::{ConversationState, EntityId, RequestId};
use gridtalk_shared::WorldEvent;
use thiserror::Error;

use crate::application::services::world_state::WorldStateStore;
use crate::infrastructure::websocket::ClientMessageBuilder;
use crate::ports::outbound::{CommandSink, SendError};

/// Ordered (initiator, target) pair.
pub type PairKey = (EntityId, EntityId);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NegotiationConfig {
    /// Maximum Euclidean distance, in cells, between requester and target.
    pub initiation_radius: f64,
    /// Applied when a rejection carries no explicit `cooldownUntil`.
    pub cooldown: Duration,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            initiation_radius: 15.0,
            cooldown: Duration::milliseconds(10_000),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum NegotiationError {
    #[error("Local entity {0} is not in the world yet")]
    UnknownLocalEntity(EntityId),
    #[error("Cannot start a conversation while {0}")]
    NotIdle(ConversationState),
    #[error("Cannot start a conversation with yourself")]
    SelfTarget,
    #[error("Unknown entity {0}")]
    UnknownTarget(EntityId),
    #[error("{0} cannot hold a conversation")]
    NotConversable(EntityId),
    #[error("{target} is busy ({state})")]
    TargetBusy {
        target: EntityId,
        state: ConversationState,
    },
    #[error("{target} is too far away ({distance:.1} > {radius:.1})")]
    OutOfRange {
        target: EntityId,
        distance: f64,
        radius: f64,
    },
    #[error("Cooldown active for another {remaining_ms} ms")]
    CooldownActive { remaining_ms: i64 },
    #[error("A request to {0} is already pending")]
    AlreadyPending(EntityId),
    #[error("No pending request {0}")]
    UnknownRequest(RequestId),
    #[error("Request {0} was already answered")]
    AlreadyResponded(RequestId),
    #[error("Not in a conversation")]
    NotInConversation,
    #[error(transparent)]
    Send(#[from] SendError),
}

/// A request we sent that the server has not resolved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    pub target_id: EntityId,
    /// Known once the server echoes CONVERSATION_REQUESTED.
    pub request_id: Option<RequestId>,
    pub sent_at: DateTime<Utc>,
    /// The store has shown the local entity leave IDLE for this request.
    pub acknowledged: bool,
}

/// A request addressed to the local entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRequest {
    pub request_id: RequestId,
    pub initiator_id: EntityId,
    pub initiator_name: String,
    pub expires_at: DateTime<Utc>,
    pub reason: Option<String>,
    /// Accept or reject already sent; waiting for the outcome.
    pub responded: bool,
}

impl ConversationRequest {
    /// Past its advertised expiry. Display only.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Something the overlay learned that the user may want to hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationNotice {
    IncomingRequest(ConversationRequest),
    Accepted {
        initiator_id: EntityId,
        target_id: EntityId,
    },
    Rejected {
        initiator_id: EntityId,
        target_id: EntityId,
        cooldown_until: DateTime<Utc>,
    },
}

#[derive(Debug, Default)]
pub struct ConversationNegotiator {
    config: NegotiationConfig,
    outgoing: HashMap<PairKey, OutgoingRequest>,
    incoming: HashMap<RequestId, ConversationRequest>,
    cooldowns: HashMap<PairKey, DateTime<Utc>>,
}

impl ConversationNegotiator {
    pub fn new(config: NegotiationConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    /// Check every local guard, then send REQUEST_CONVERSATION.
    ///
    /// Nothing is sent when a guard fails.
    pub fn request(
        &mut self,
        world: &WorldStateStore,
        sink: &dyn CommandSink,
        local: &EntityId,
        target: &EntityId,
        now: DateTime<Utc>,
    ) -> Result<(), NegotiationError> {
        self.check_request(world, local, target, now)?;

        sink.send(ClientMessageBuilder::request_conversation(target))?;
        self.outgoing.insert(
            (local.clone(), target.clone()),
            OutgoingRequest {
                target_id: target.clone(),
                request_id: None,
                sent_at: now,
                acknowledged: false,
            },
        );
        tracing::debug!(initiator = %local, target = %target, "Conversation request sent");
        Ok(())
    }

    /// The guard half of [`request`](Self::request), with no side effects.
    pub fn check_request(
        &self,
        world: &WorldStateStore,
        local: &EntityId,
        target: &EntityId,
        now: DateTime<Utc>,
    ) -> Result<(), NegotiationError> {
        let me = world
            .get(local)
            .ok_or_else(|| NegotiationError::UnknownLocalEntity(local.clone()))?;
        if !me.conversation.state.is_idle() {
            return Err(NegotiationError::NotIdle(me.conversation.state));
        }
        if target == local {
            return Err(NegotiationError::SelfTarget);
        }

        let other = world
            .get(target)
            .ok_or_else(|| NegotiationError::UnknownTarget(target.clone()))?;
        if !other.kind.can_converse() {
            return Err(NegotiationError::NotConversable(target.clone()));
        }
        if !other.conversation.state.is_idle() {
            return Err(NegotiationError::TargetBusy {
                target: target.clone(),
                state: other.conversation.state,
            });
        }

        let distance = me.position.distance_to(other.position);
        if distance > self.config.initiation_radius {
            return Err(NegotiationError::OutOfRange {
                target: target.clone(),
                distance,
                radius: self.config.initiation_radius,
            });
        }

        let pair = (local.clone(), target.clone());
        if let Some(remaining) = self.cooldown_remaining(&pair, now) {
            return Err(NegotiationError::CooldownActive {
                remaining_ms: remaining.num_milliseconds(),
            });
        }
        if self.outgoing.contains_key(&pair) {
            return Err(NegotiationError::AlreadyPending(target.clone()));
        }
        Ok(())
    }

    pub fn accept(
        &mut self,
        sink: &dyn CommandSink,
        request_id: &RequestId,
    ) -> Result<(), NegotiationError> {
        self.respond(sink, request_id, true)
    }

    pub fn reject(
        &mut self,
        sink: &dyn CommandSink,
        request_id: &RequestId,
    ) -> Result<(), NegotiationError> {
        self.respond(sink, request_id, false)
    }

    fn respond(
        &mut self,
        sink: &dyn CommandSink,
        request_id: &RequestId,
        accept: bool,
    ) -> Result<(), NegotiationError> {
        let request = self
            .incoming
            .get_mut(request_id)
            .ok_or_else(|| NegotiationError::UnknownRequest(request_id.clone()))?;
        if request.responded {
            return Err(NegotiationError::AlreadyResponded(request_id.clone()));
        }

        let message = if accept {
            ClientMessageBuilder::accept_conversation(request_id)
        } else {
            ClientMessageBuilder::reject_conversation(request_id)
        };
        sink.send(message)?;
        request.responded = true;
        tracing::debug!(%request_id, accept, "Answered conversation request");
        Ok(())
    }

    /// Send END_CONVERSATION if the local entity is walking to or in one.
    pub fn end(
        &self,
        world: &WorldStateStore,
        sink: &dyn CommandSink,
        local: &EntityId,
    ) -> Result<(), NegotiationError> {
        let me = world
            .get(local)
            .ok_or_else(|| NegotiationError::UnknownLocalEntity(local.clone()))?;
        match me.conversation.state {
            ConversationState::InConversation | ConversationState::WalkingToConversation => {
                sink.send(ClientMessageBuilder::end_conversation())?;
                Ok(())
            }
            _ => Err(NegotiationError::NotInConversation),
        }
    }

    /// Update the overlay from one authoritative event.
    pub fn observe(
        &mut self,
        event: &WorldEvent,
        local: Option<&EntityId>,
        now: DateTime<Utc>,
    ) -> Option<NegotiationNotice> {
        match event {
            WorldEvent::ConversationRequested {
                request_id,
                initiator_id,
                target_id,
                initiator_name,
                expires_at,
                reason,
            } => {
                if Some(initiator_id) == local {
                    let entry = self
                        .outgoing
                        .entry((initiator_id.clone(), target_id.clone()))
                        .or_insert_with(|| OutgoingRequest {
                            target_id: target_id.clone(),
                            request_id: None,
                            sent_at: now,
                            acknowledged: false,
                        });
                    entry.request_id = Some(request_id.clone());
                    return None;
                }
                if Some(target_id) != local {
                    return None;
                }

                // One pending request per pair: a newer one supersedes.
                self.incoming
                    .retain(|_, r| &r.initiator_id != initiator_id);
                let request = ConversationRequest {
                    request_id: request_id.clone(),
                    initiator_id: initiator_id.clone(),
                    initiator_name: initiator_name
                        .clone()
                        .unwrap_or_else(|| initiator_id.to_string()),
                    expires_at: *expires_at,
                    reason: reason.clone(),
                    responded: false,
                };
                self.incoming.insert(request_id.clone(), request.clone());
                tracing::debug!(%request_id, initiator = %initiator_id, "Incoming conversation request");
                Some(NegotiationNotice::IncomingRequest(request))
            }
            WorldEvent::ConversationAccepted {
                request_id,
                initiator_id,
                target_id,
            } => {
                let involved = self.resolve(request_id, initiator_id, target_id);
                involved.then(|| NegotiationNotice::Accepted {
                    initiator_id: initiator_id.clone(),
                    target_id: target_id.clone(),
                })
            }
            WorldEvent::ConversationRejected {
                request_id,
                initiator_id,
                target_id,
                cooldown_until,
            } => {
                let involved = self.resolve(request_id, initiator_id, target_id);
                let until = cooldown_until.unwrap_or(now + self.config.cooldown);
                self.cooldowns
                    .insert((initiator_id.clone(), target_id.clone()), until);
                tracing::debug!(
                    initiator = %initiator_id,
                    target = %target_id,
                    until = %until,
                    "Cooldown installed"
                );
                involved.then(|| NegotiationNotice::Rejected {
                    initiator_id: initiator_id.clone(),
                    target_id: target_id.clone(),
                    cooldown_until: until,
                })
            }
            WorldEvent::ConversationStarted {
                participant1_id,
                participant2_id,
                ..
            } => {
                self.forget_pair(participant1_id, participant2_id);
                None
            }
            WorldEvent::EntityStateChanged {
                entity_id,
                conversation_state,
                ..
            } if Some(entity_id) == local && !conversation_state.is_idle() => {
                self.acknowledge_outgoing(entity_id);
                None
            }
            _ => None,
        }
    }

    /// Drop overlay entries for a resolved request. Returns whether the
    /// overlay knew about it.
    fn resolve(&mut self, request_id: &RequestId, initiator: &EntityId, target: &EntityId) -> bool {
        let outgoing = self
            .outgoing
            .remove(&(initiator.clone(), target.clone()))
            .is_some();
        let incoming = self.incoming.remove(request_id).is_some();
        outgoing || incoming
    }

    fn acknowledge_outgoing(&mut self, local: &EntityId) {
        for ((initiator, _), request) in self.outgoing.iter_mut() {
            if initiator == local {
                request.acknowledged = true;
            }
        }
    }

    /// Forget our requests the server never echoed. Called when the server
    /// answers with an ERROR, which is how a refused request comes back.
    pub fn drop_unconfirmed(&mut self, local: &EntityId) -> usize {
        let before = self.outgoing.len();
        self.outgoing.retain(|(initiator, target), request| {
            let keep = initiator != local || request.request_id.is_some();
            if !keep {
                tracing::debug!(%target, "Dropping unconfirmed conversation request");
            }
            keep
        });
        before - self.outgoing.len()
    }

    fn forget_pair(&mut self, a: &EntityId, b: &EntityId) {
        self.outgoing
            .retain(|(i, t), _| !((i == a && t == b) || (i == b && t == a)));
        self.incoming
            .retain(|_, r| &r.initiator_id != a && &r.initiator_id != b);
    }

    /// Correct the overlay against the store after it changed.
    ///
    /// Entries naming an entity that is no longer in the world are dropped.
    /// Once the local entity is in a conversation no outgoing request of
    /// ours can still be open, and once it is back to IDLE after having
    /// been pending, the request was resolved without a resolution event
    /// (expired server-side).
    pub fn reconcile(&mut self, world: &WorldStateStore, local: Option<&EntityId>) {
        let before = self.outgoing.len() + self.incoming.len();

        self.outgoing
            .retain(|(initiator, target), _| world.contains(initiator) && world.contains(target));
        self.incoming.retain(|_, r| world.contains(&r.initiator_id));

        if let Some(me) = local.and_then(|id| world.get(id)) {
            match me.conversation.state {
                ConversationState::InConversation => {
                    self.outgoing.retain(|(initiator, _), _| initiator != &me.id);
                }
                ConversationState::Idle => {
                    self.outgoing
                        .retain(|(initiator, _), r| initiator != &me.id || !r.acknowledged);
                }
                ConversationState::PendingRequest | ConversationState::WalkingToConversation => {
                    self.acknowledge_outgoing(&me.id);
                }
            }
        }

        let dropped = before - (self.outgoing.len() + self.incoming.len());
        if dropped > 0 {
            tracing::debug!(dropped, "Reconciled negotiation overlay");
        }
    }

    /// Forget cooldowns that have run out.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.cooldowns.len();
        self.cooldowns.retain(|_, until| *until > now);
        before - self.cooldowns.len()
    }

    /// Time left on the pair's cooldown; `None` once `now` reaches the expiry.
    pub fn cooldown_remaining(&self, pair: &PairKey, now: DateTime<Utc>) -> Option<Duration> {
        self.cooldowns
            .get(pair)
            .filter(|until| now < **until)
            .map(|until| *until - now)
    }

    pub fn is_pending(&self, initiator: &EntityId, target: &EntityId) -> bool {
        self.outgoing
            .contains_key(&(initiator.clone(), target.clone()))
    }

    pub fn outgoing(&self) -> impl Iterator<Item = &OutgoingRequest> {
        self.outgoing.values()
    }

    pub fn incoming(&self, request_id: &RequestId) -> Option<&ConversationRequest> {
        self.incoming.get(request_id)
    }

    /// Incoming requests, soonest expiry first, each with its stale flag.
    pub fn incoming_requests(&self, now: DateTime<Utc>) -> Vec<(&ConversationRequest, bool)> {
        let mut requests: Vec<_> = self
            .incoming
            .values()
            .map(|r| (r, r.is_stale(now)))
            .collect();
        requests.sort_by(|a, b| {
            a.0.expires_at
                .cmp(&b.0.expires_at)
                .then_with(|| a.0.request_id.cmp(&b.0.request_id))
        });
        requests
    }

    pub fn cooldown_count(&self) -> usize {
        self.cooldowns.len()
    }
}
