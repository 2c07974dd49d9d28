//! Telemetry messages as accepted by the router.

use serde_json::{Map, Value};

use crate::domain::foundation::Timestamp;

/// One telemetry snapshot from the producer.
///
/// `raw` is the exact text the producer sent and is what consumers receive.
/// The sequence number and arrival time are assigned by the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryMessage {
    sequence: u64,
    received_at: Timestamp,
    raw: String,
    fields: Map<String, Value>,
}

impl TelemetryMessage {
    pub fn new(
        sequence: u64,
        received_at: Timestamp,
        raw: String,
        fields: Map<String, Value>,
    ) -> Self {
        Self {
            sequence,
            received_at,
            raw,
            fields,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn received_at(&self) -> Timestamp {
        self.received_at
    }

    /// The payload exactly as the producer sent it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Sensor fields as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Monotonic sequence assigned to telemetry in arrival order.
///
/// Starts at 1 so that 0 never appears on the wire.
#[derive(Debug, Default)]
pub struct TelemetrySequence {
    last: u64,
}

impl TelemetrySequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next sequence number.
    pub fn next(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}
