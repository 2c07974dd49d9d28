//! Actuator commands and the deduplication policy applied before forwarding.
//!
//! A command is forwarded to the producer when any of these holds:
//!
//! - nothing was ever forwarded for that actuator
//! - the requested value differs from the last forwarded value
//! - the cooldown has elapsed since the last forward for that actuator
//!
//! The last-forwarded table only changes through [`CommandDeduplicator::record`],
//! which callers invoke after the producer actually accepted the frame.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use super::errors::ProtocolError;

/// `{actuator, value}` as requested by a consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMessage {
    actuator: String,
    value: Value,
}

impl CommandMessage {
    /// Validates and builds a command.
    ///
    /// The actuator must be non-blank and the value a JSON scalar
    /// (`"ON"`, `0`, `true`, ...).
    pub fn new(actuator: impl Into<String>, value: Value) -> Result<Self, ProtocolError> {
        let actuator = actuator.into();
        if actuator.trim().is_empty() {
            return Err(ProtocolError::invalid_frame("cmd", "actuator name is empty"));
        }
        match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(Self { actuator, value }),
            Value::Null => Err(ProtocolError::invalid_frame("cmd", "value is missing")),
            Value::Array(_) | Value::Object(_) => Err(ProtocolError::invalid_frame(
                "cmd",
                "value must be a string, number or boolean",
            )),
        }
    }

    pub fn actuator(&self) -> &str {
        &self.actuator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// What was last sent to the producer for one actuator.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardedCommand {
    pub value: Value,
    pub sent_at: Instant,
}

/// Why a command passed deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardReason {
    FirstCommand,
    ValueChanged,
    CooldownElapsed,
}

/// Outcome of evaluating a command against the last-forwarded table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    Forward(ForwardReason),
    Duplicate,
}

/// Per-actuator last-forwarded table with a cooldown window.
#[derive(Debug)]
pub struct CommandDeduplicator {
    cooldown: Duration,
    last_forwarded: HashMap<String, ForwardedCommand>,
}

impl CommandDeduplicator {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_forwarded: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Decide whether `command` should reach the producer at `now`.
    ///
    /// Pure: the table is not modified.
    pub fn evaluate(&self, command: &CommandMessage, now: Instant) -> DedupDecision {
        match self.last_forwarded.get(command.actuator()) {
            None => DedupDecision::Forward(ForwardReason::FirstCommand),
            Some(last) if last.value != *command.value() => {
                DedupDecision::Forward(ForwardReason::ValueChanged)
            }
            Some(last) if now.saturating_duration_since(last.sent_at) >= self.cooldown => {
                DedupDecision::Forward(ForwardReason::CooldownElapsed)
            }
            Some(_) => DedupDecision::Duplicate,
        }
    }

    /// Remember that `command` was delivered to the producer at `now`.
    pub fn record(&mut self, command: &CommandMessage, now: Instant) {
        self.last_forwarded.insert(
            command.actuator().to_string(),
            ForwardedCommand {
                value: command.value().clone(),
                sent_at: now,
            },
        );
    }

    /// Forget every forwarded command. Called whenever the producer changes.
    pub fn reset(&mut self) {
        self.last_forwarded.clear();
    }
}
