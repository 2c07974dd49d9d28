//! Foundation module - Shared domain primitives.
//!
//! Contains the value objects the relay vocabulary is built on.

mod ids;
mod timestamp;

pub use ids::ConnectionId;
pub use timestamp::Timestamp;
