//! Telemetry forwarding to the durable-storage collaborator.
//!
//! [`TelemetryForwarder::forward`] normalizes the message on the caller's
//! task and then detaches the network call with `tokio::spawn`. The relay
//! loop never awaits the result; failures are logged and dropped.
//! [`TelemetryForwarder::forward_status`] does the same for producer
//! online/offline records.

mod http_sink;

pub use http_sink::HttpTelemetrySink;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::domain::relay::{SystemStatusRecord, TelemetryMessage, TelemetryRecord};
use crate::ports::TelemetrySink;

/// Fire-and-forget front for a [`TelemetrySink`].
#[derive(Clone)]
pub struct TelemetryForwarder {
    sink: Arc<dyn TelemetrySink>,
}

impl TelemetryForwarder {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink }
    }

    /// Forward one accepted message produced by `source`.
    ///
    /// Returns immediately. The handle is only useful to tests; dropping it
    /// does not cancel the request.
    pub fn forward(&self, message: &TelemetryMessage, source: &str) -> JoinHandle<()> {
        let record = TelemetryRecord::from_message(message, source);
        let sink = Arc::clone(&self.sink);

        tokio::spawn(async move {
            match sink.log_telemetry(&record).await {
                Ok(()) => tracing::debug!(sequence = record.sequence, "Telemetry forwarded"),
                Err(e) => tracing::warn!(
                    sequence = record.sequence,
                    error = %e,
                    "Telemetry forwarding failed"
                ),
            }
        })
    }

    /// Forward a producer availability change. Same delivery rules as [`Self::forward`].
    pub fn forward_status(&self, record: SystemStatusRecord) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);

        tokio::spawn(async move {
            match sink.log_system_status(&record).await {
                Ok(()) => tracing::debug!(status = ?record.status, "System status forwarded"),
                Err(e) => tracing::warn!(
                    status = ?record.status,
                    error = %e,
                    "System status forwarding failed"
                ),
            }
        })
    }
}
