//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind host: {0}")]
    InvalidHost(String),

    #[error("Heartbeat interval must be between 1 and 600 seconds")]
    InvalidHeartbeatInterval,

    #[error("Queue capacities must be greater than zero")]
    InvalidCapacity,

    #[error("Telemetry sink URL must use http or https")]
    InvalidSinkUrl,

    #[error("Invalid request timeout")]
    InvalidTimeout,
}
