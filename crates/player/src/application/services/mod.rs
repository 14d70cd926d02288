//! Application services - the client's event-processing core.

pub mod chat_service;
pub mod conversation_service;
pub mod movement_service;
pub mod session_service;
pub mod world_state;

pub use chat_service::{Bubble, ChatChannel, ChatConfig, ChatError, ChatMessage, IngestOutcome};
pub use conversation_service::{
    ConversationNegotiator, ConversationRequest, NegotiationConfig, NegotiationError,
    NegotiationNotice, OutgoingRequest,
};
pub use movement_service::{MovementController, MovementError, PlanOutcome};
pub use session_service::{Connectivity, GameSession, Notice, SessionError};
pub use world_state::{apply_event, ApplyReport, EventOutcome, WorldStateStore};
