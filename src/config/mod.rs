//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `AGRI_RELAY` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use agri_relay::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Relay heartbeat every {:?}", config.relay.heartbeat_interval());
//! ```

mod error;
mod forwarder;
mod relay;
mod server;

pub use error::{ConfigError, ValidationError};
pub use forwarder::ForwarderConfig;
pub use relay::RelayConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so the relay starts with no environment at all.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Relay behaviour (heartbeat, command cooldown, queue sizes)
    #[serde(default)]
    pub relay: RelayConfig,

    /// Telemetry sink (durable-storage endpoint)
    #[serde(default)]
    pub forwarder: ForwarderConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `AGRI_RELAY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `AGRI_RELAY__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `AGRI_RELAY__RELAY__HEARTBEAT_INTERVAL_SECS=30` -> `relay.heartbeat_interval_secs = 30`
    /// - `AGRI_RELAY__RELAY__COMMAND_COOLDOWN_MS=5000` -> `relay.command_cooldown_ms = 5000`
    /// - `AGRI_RELAY__FORWARDER__URL=http://...` -> `forwarder.url = ...`
    /// - `AGRI_RELAY__FORWARDER__STATUS_URL=http://...` -> `forwarder.status_url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("AGRI_RELAY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.relay.validate()?;
        self.forwarder.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
