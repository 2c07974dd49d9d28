//! Relay configuration (heartbeat, command cooldown, queue sizes)

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Longest accepted heartbeat interval (10 minutes).
const MAX_HEARTBEAT_INTERVAL_SECS: u64 = 600;

/// Relay behaviour configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Seconds between heartbeat sweeps
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Minimum milliseconds between identical commands for the same actuator
    #[serde(default = "default_command_cooldown")]
    pub command_cooldown_ms: u64,

    /// Frames buffered per connection before it counts as unwritable
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,

    /// Events buffered between connection tasks and the relay loop
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl RelayConfig {
    /// Heartbeat interval as a `Duration`
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Command cooldown as a `Duration`
    pub fn command_cooldown(&self) -> Duration {
        Duration::from_millis(self.command_cooldown_ms)
    }

    /// Validate relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.heartbeat_interval_secs == 0
            || self.heartbeat_interval_secs > MAX_HEARTBEAT_INTERVAL_SECS
        {
            return Err(ValidationError::InvalidHeartbeatInterval);
        }
        if self.outbound_capacity == 0 || self.event_capacity == 0 {
            return Err(ValidationError::InvalidCapacity);
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            command_cooldown_ms: default_command_cooldown(),
            outbound_capacity: default_outbound_capacity(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_command_cooldown() -> u64 {
    5_000
}

fn default_outbound_capacity() -> usize {
    64
}

fn default_event_capacity() -> usize {
    1024
}
