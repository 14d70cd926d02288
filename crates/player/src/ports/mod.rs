//! Ports - trait seams between the application layer and infrastructure.

pub mod outbound;
