//! Unified error types for the domain layer

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A direction component was outside -1..=1
    #[error("Invalid direction component: ({dx}, {dy})")]
    InvalidDirection { dx: i32, dy: i32 },

    /// Facing must be one of the four unit vectors or zero
    #[error("Invalid facing vector: ({x}, {y})")]
    InvalidFacing { x: i32, y: i32 },

    /// Grid dimensions must be non-zero
    #[error("Invalid grid size: {width}x{height}")]
    InvalidGridSize { width: u32, height: u32 },
}
