//! Single-slot cache of the most recent telemetry message.

use std::sync::Arc;

use super::telemetry::TelemetryMessage;

/// Holds zero or one telemetry message; every store overwrites.
///
/// Lives as long as the process. A producer disconnect leaves the slot
/// intact, so late consumers still get the last known (stale) state.
#[derive(Debug, Default)]
pub struct LastStateCache {
    slot: Option<Arc<TelemetryMessage>>,
}

impl LastStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, message: Arc<TelemetryMessage>) {
        self.slot = Some(message);
    }

    pub fn get(&self) -> Option<&Arc<TelemetryMessage>> {
        self.slot.as_ref()
    }

    pub fn sequence(&self) -> Option<u64> {
        self.slot.as_ref().map(|m| m.sequence())
    }
}
