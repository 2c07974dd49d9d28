//! TelemetrySink port - Interface to the durable-storage collaborator.
//!
//! The relay never persists telemetry itself. After the router accepts a
//! message it hands a normalized [`TelemetryRecord`] to a sink, off the
//! relay loop, and only logs the outcome. Producer online/offline changes
//! go through the same seam as [`SystemStatusRecord`]s.
//!
//! # Example
//!
//! ```ignore
//! struct StdoutSink;
//!
//! #[async_trait]
//! impl TelemetrySink for StdoutSink {
//!     async fn log_telemetry(&self, record: &TelemetryRecord) -> Result<(), ForwardError> {
//!         println!("{:?}", record);
//!         Ok(())
//!     }
//!
//!     async fn log_system_status(&self, record: &SystemStatusRecord) -> Result<(), ForwardError> {
//!         println!("{} {:?}", record.component, record.status);
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::relay::{SystemStatusRecord, TelemetryRecord};

/// Errors a sink can report. None of them are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardError {
    #[error("telemetry sink timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("telemetry sink returned HTTP {status}")]
    Status { status: u16 },

    #[error("telemetry sink unreachable: {0}")]
    Network(String),

    #[error("telemetry sink client could not be built: {0}")]
    Client(String),
}

/// Port for logging telemetry to durable storage.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Store one record. Called at most once per accepted telemetry message.
    async fn log_telemetry(&self, record: &TelemetryRecord) -> Result<(), ForwardError>;

    /// Store a component availability change.
    async fn log_system_status(&self, record: &SystemStatusRecord) -> Result<(), ForwardError>;
}
