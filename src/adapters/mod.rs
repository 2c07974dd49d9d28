//! Adapters - Transports and port implementations.
//!
//! Adapters connect the relay domain to the outside world:
//! - `websocket` - Producer/consumer connections and the relay loop
//! - `http` - Application router and status endpoints
//! - `forwarder` - Telemetry sink over HTTP

pub mod forwarder;
pub mod http;
pub mod websocket;

pub use forwarder::{HttpTelemetrySink, TelemetryForwarder};
pub use self::http::app_router;
pub use websocket::{Relay, RelayHandle, RelaySettings};
