//! WebSocket adapters for the sensor/command relay.
//!
//! One producer (the field controller) pushes telemetry; any number of
//! consumers (dashboards) receive it and send actuator commands back.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  telemetry               ┌──────────────────────────────┐   raw frame   ┌─────────────┐
//! │  Producer  │ ───────────────────────► │          Relay loop          │ ────────────► │ Consumer a  │
//! │  (ESP32)   │ ◄─────────────────────── │  ConnectionRegistry          │ ────────────► │ Consumer b  │
//! └────────────┘  deduplicated commands   │  LastStateCache              │ ◄──────────── │  ...        │
//!                                         │  CommandDeduplicator         │   cmd frames  └─────────────┘
//!                                         │  HeartbeatMonitor            │
//!                                         └──────────────────────────────┘
//!                                                        │ spawn
//!                                                        ▼
//!                                                TelemetryForwarder ──► storage sink
//! ```
//!
//! # Components
//!
//! - [`messages`] - WebSocket message protocol types
//! - [`registry`] - Connection tracking and the producer slot
//! - [`heartbeat`] - Liveness sweeps
//! - [`relay`] - The relay loop and its handle
//! - [`handler`] - Axum WebSocket upgrade handler

pub mod handler;
pub mod heartbeat;
pub mod messages;
pub mod registry;
pub mod relay;

pub use handler::{websocket_router, ws_handler, WebSocketState};
pub use heartbeat::{HeartbeatMonitor, HeartbeatSweep};
pub use messages::{
    AckMessage, ErrorMessage, InboundFrame, Outbound, PongMessage, ProducerStatus,
    ProducerStatusMessage, ServerMessage, PRODUCER_NOT_CONNECTED,
};
pub use registry::{ConnectionEntry, ConnectionRegistry, DeliveryError, Liveness};
pub use relay::{PeerSummary, Relay, RelayClosed, RelayEvent, RelayHandle, RelaySettings, RelayStatus};
