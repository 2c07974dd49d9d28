//! Ports - Interfaces to collaborators outside the relay.
//!
//! - `TelemetrySink` - durable storage for accepted telemetry

mod telemetry_sink;

pub use telemetry_sink::{ForwardError, TelemetrySink};
