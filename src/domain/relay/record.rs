//! Storage-shaped telemetry record sent to the durable sink.
//!
//! Producer field names are short (`soil`, `flow`, `pump`); the storage
//! schema uses descriptive column names and typed values. Fields that are
//! unknown, or whose value cannot be coerced to the column type, are kept
//! verbatim under `extra` rather than dropped.
//!
//! Producer availability is logged separately as a [`SystemStatusRecord`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::foundation::Timestamp;

use super::telemetry::TelemetryMessage;

/// Normalized telemetry row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub sequence: u64,
    pub received_at: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soil_moisture: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rain_raw: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rain_detected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_raw: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_liters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_status: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl TelemetryRecord {
    /// Normalize an accepted telemetry message produced by `source`.
    pub fn from_message(message: &TelemetryMessage, source: &str) -> Self {
        let mut record = TelemetryRecord {
            sequence: message.sequence(),
            received_at: message.received_at().to_rfc3339(),
            source: source.to_string(),
            ..Default::default()
        };

        for (key, value) in message.fields() {
            let stored = match key.as_str() {
                "soil" => assign(&mut record.soil_moisture, as_f64(value)),
                "temperature" => assign(&mut record.temperature, as_f64(value)),
                "humidity" => assign(&mut record.humidity, as_f64(value)),
                "rain_raw" => assign(&mut record.rain_raw, as_i64(value)),
                "rain_detected" => assign(&mut record.rain_detected, as_bool(value)),
                "light_raw" => assign(&mut record.light_raw, as_i64(value)),
                "light_percent" => assign(&mut record.light_percent, as_f64(value)),
                "light_state" => assign(&mut record.light_state, as_string(value)),
                "flow" => assign(&mut record.flow_rate, as_f64(value)),
                "total" => assign(&mut record.total_liters, as_f64(value)),
                "pump" => assign(&mut record.pump_status, as_switch(value)),
                "mode" => assign(&mut record.mode, as_string(value).map(|m| m.to_uppercase())),
                _ => false,
            };
            if !stored {
                record.extra.insert(key.clone(), value.clone());
            }
        }

        record
    }
}

/// Availability of a logged component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Online,
    Offline,
}

/// Row for the system status log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatusRecord {
    pub timestamp: String,
    pub component: String,
    pub status: ComponentStatus,
    pub message: String,
}

impl SystemStatusRecord {
    /// The producer `peer_id` came online or went offline at `at`.
    pub fn producer(status: ComponentStatus, peer_id: &str, at: Timestamp) -> Self {
        let change = match status {
            ComponentStatus::Online => "connected",
            ComponentStatus::Offline => "disconnected",
        };
        Self {
            timestamp: at.to_rfc3339(),
            component: "producer".to_string(),
            status,
            message: format!("Producer {} {}", peer_id, change),
        }
    }
}

fn assign<T>(slot: &mut Option<T>, value: Option<T>) -> bool {
    match value {
        Some(v) => {
            *slot = Some(v);
            true
        }
        None => false,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// Pump state arrives as 0/1, true/false or "ON"/"OFF".
fn as_switch(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => match s.trim().to_ascii_uppercase().as_str() {
            "ON" => Some(1),
            "OFF" => Some(0),
            other => other.parse().ok(),
        },
        Value::Bool(b) => Some(i64::from(*b)),
        other => as_i64(other),
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
