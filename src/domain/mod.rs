//! Domain layer containing relay logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps)
//! - `relay` - Roles, telemetry, last-state cache, command deduplication

pub mod foundation;
pub mod relay;
