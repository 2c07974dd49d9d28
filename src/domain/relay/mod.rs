//! Relay domain - roles, telemetry, last-state cache and command policy.
//!
//! Everything here is plain data and synchronous logic. The relay loop in
//! `adapters::websocket::relay` owns one instance of each and drives them.

mod command;
mod errors;
mod last_state;
mod record;
mod role;
mod telemetry;

pub use command::{
    CommandDeduplicator, CommandMessage, DedupDecision, ForwardReason, ForwardedCommand,
};
pub use errors::ProtocolError;
pub use last_state::LastStateCache;
pub use record::{ComponentStatus, SystemStatusRecord, TelemetryRecord};
pub use role::{resolve_peer_id, ConnectionState, Role};
pub use telemetry::{TelemetryMessage, TelemetrySequence};
