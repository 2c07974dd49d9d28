//! Agri Relay - Real-time sensor/command relay
//!
//! Relays telemetry from a single field controller to any number of
//! dashboards, and deduplicated actuator commands from the dashboards back to
//! the controller. Accepted telemetry is forwarded to a durable-storage sink.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
