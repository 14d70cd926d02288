//! Gridtalk Domain - core value types for the shared grid world.
//!
//! Pure data and algorithms: no I/O, no async, no wire format.

pub mod conversation;
pub mod entity;
pub mod error;
pub mod grid;
pub mod ids;
pub mod pathfinding;

pub use conversation::{ConversationState, EntityConversation};
pub use entity::{EntityKind, Vitals, VitalsPatch, WorldEntity};
pub use error::DomainError;
pub use grid::{Direction, Facing, GridMap, GridPos, Vector, MAX_GRID_CELLS};
pub use ids::{ConversationId, EntityId, MessageId, RequestId, UserId};
pub use pathfinding::{PathPlan, Pathfinder, NEIGHBOR_ORDER};
