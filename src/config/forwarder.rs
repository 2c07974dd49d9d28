//! Telemetry forwarder configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Telemetry sink configuration
///
/// Forwarding is disabled unless `url` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct ForwarderConfig {
    /// Endpoint receiving `POST`ed telemetry records
    pub url: Option<String>,

    /// Endpoint receiving producer online/offline events; not sent when unset
    pub status_url: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl ForwarderConfig {
    /// Whether a sink endpoint is configured
    pub fn is_enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }

    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Status endpoint, if one is configured
    pub fn status_url(&self) -> Option<&str> {
        self.status_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    /// Validate forwarder configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let configured = [self.url.as_deref(), self.status_url.as_deref()];
        for url in configured.into_iter().flatten().filter(|u| !u.trim().is_empty()) {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidSinkUrl);
            }
        }
        if self.timeout_secs == 0 || self.timeout_secs > 60 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            url: None,
            status_url: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default() {
        let config = ForwarderConfig::default();
        assert!(!config.is_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn blank_url_counts_as_disabled() {
        let config = ForwarderConfig {
            url: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(!config.is_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn http_url_is_accepted() {
        let config = ForwarderConfig {
            url: Some("http://localhost:8000/log".to_string()),
            ..Default::default()
        };
        assert!(config.is_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_http_url_is_rejected() {
        let config = ForwarderConfig {
            url: Some("ftp://storage.local/log".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidSinkUrl)
        ));
    }

    #[test]
    fn status_url_is_optional_and_validated() {
        let config = ForwarderConfig {
            url: Some("http://localhost:8000/log".to_string()),
            status_url: Some("http://localhost:8000/system-status".to_string()),
            ..Default::default()
        };
        assert_eq!(config.status_url(), Some("http://localhost:8000/system-status"));
        assert!(config.validate().is_ok());

        let invalid = ForwarderConfig {
            status_url: Some("storage.local/status".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            invalid.validate(),
            Err(ValidationError::InvalidSinkUrl)
        ));
    }

    #[test]
    fn timeout_bounds_are_enforced() {
        for timeout_secs in [0, 61] {
            let config = ForwarderConfig {
                timeout_secs,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ValidationError::InvalidTimeout)
            ));
        }
    }
}
