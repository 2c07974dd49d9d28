//! WebSocket message types for the relay protocol.
//!
//! Defines the protocol between the relay and its peers:
//! - Client → Server: registration, telemetry (producer), commands and pings (consumer)
//! - Server → Client: acknowledgements, errors, pongs, producer lifecycle
//!
//! Telemetry and forwarded commands are not re-encoded; the relay passes the
//! peer's original text through, so they have no server-side type here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::relay::{CommandMessage, ProtocolError, Role};

// ============================================
// Server → Client Messages
// ============================================

/// All message types the relay itself originates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Registration accepted.
    Ack(AckMessage),

    /// Something the peer sent could not be acted on.
    Error(ErrorMessage),

    /// Application-level keepalive response.
    Pong(PongMessage),

    /// The producer connected, disconnected or was replaced.
    ProducerStatus(ProducerStatusMessage),
}

/// Sent in reply to a successful registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AckMessage {
    pub role: Role,
    pub id: String,
}

/// Error message sent to a peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMessage {
    pub message: String,
}

/// Heartbeat response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PongMessage {
    pub timestamp: String,
}

/// Producer lifecycle notification, sent to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProducerStatusMessage {
    pub status: ProducerStatus,
    pub id: String,
}

/// Producer lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerStatus {
    Connected,
    Disconnected,
    Replaced,
}

/// Wire text of the unreachable-producer error.
pub const PRODUCER_NOT_CONNECTED: &str = "producer not connected";

impl ServerMessage {
    pub fn ack(role: Role, id: impl Into<String>) -> Self {
        ServerMessage::Ack(AckMessage { role, id: id.into() })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            message: message.into(),
        })
    }

    pub fn producer_not_connected() -> Self {
        Self::error(PRODUCER_NOT_CONNECTED)
    }

    pub fn pong(timestamp: impl Into<String>) -> Self {
        ServerMessage::Pong(PongMessage {
            timestamp: timestamp.into(),
        })
    }

    pub fn producer_status(status: ProducerStatus, id: impl Into<String>) -> Self {
        ServerMessage::ProducerStatus(ProducerStatusMessage {
            status,
            id: id.into(),
        })
    }

    /// Encode as a text frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ServerMessage serialization should not fail")
    }
}

// ============================================
// Client → Server Messages
// ============================================

#[derive(Debug, Deserialize)]
struct RegisterFrame {
    role: Role,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommandFrame {
    cmd: String,
    #[serde(default)]
    value: Value,
}

/// A parsed inbound frame.
///
/// Objects without a `type` field (or with `"type": "telemetry"`) are
/// telemetry. Whether a frame is acceptable from the sender's role is decided
/// by the relay, not here.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Register { role: Role, id: Option<String> },
    Telemetry(Map<String, Value>),
    Command(CommandMessage),
    Ping,
}

impl InboundFrame {
    /// Parse one text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let kind = match fields.get("type") {
            None => None,
            Some(Value::String(kind)) => Some(kind.clone()),
            Some(other) => return Err(ProtocolError::UnknownType(other.to_string())),
        };

        match kind.as_deref() {
            None | Some("telemetry") => Ok(InboundFrame::Telemetry(fields)),
            Some("register") => {
                let frame: RegisterFrame = serde_json::from_value(Value::Object(fields))
                    .map_err(|e| ProtocolError::invalid_frame("register", e.to_string()))?;
                Ok(InboundFrame::Register {
                    role: frame.role,
                    id: frame.id,
                })
            }
            Some("cmd") => {
                let frame: CommandFrame = serde_json::from_value(Value::Object(fields))
                    .map_err(|e| ProtocolError::invalid_frame("cmd", e.to_string()))?;
                Ok(InboundFrame::Command(CommandMessage::new(
                    frame.cmd,
                    frame.value,
                )?))
            }
            Some("ping") => Ok(InboundFrame::Ping),
            Some(other) => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }

    /// Short name used in logs and role errors.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundFrame::Register { .. } => "register",
            InboundFrame::Telemetry(_) => "telemetry",
            InboundFrame::Command(_) => "cmd",
            InboundFrame::Ping => "ping",
        }
    }
}

// ============================================
// Writer Queue
// ============================================

/// What the relay loop asks a connection's writer task to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send a text frame.
    Text(String),
    /// Send a transport-level ping.
    Ping,
    /// Send a close frame and stop writing.
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ack_serializes_with_type_tag() {
        let json = ServerMessage::ack(Role::Consumer, "dash-1").to_json();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, json!({"type": "ack", "role": "consumer", "id": "dash-1"}));
    }

    #[test]
    fn producer_not_connected_matches_wire_format() {
        let value: Value =
            serde_json::from_str(&ServerMessage::producer_not_connected().to_json()).unwrap();
        assert_eq!(
            value,
            json!({"type": "error", "message": "producer not connected"})
        );
    }

    #[test]
    fn producer_status_serializes_snake_case() {
        let json = ServerMessage::producer_status(ProducerStatus::Replaced, "esp32").to_json();
        assert!(json.contains(r#""type":"producer_status""#));
        assert!(json.contains(r#""status":"replaced""#));
    }

    #[test]
    fn parses_register_with_and_without_id() {
        assert_eq!(
            InboundFrame::parse(r#"{"type":"register","role":"producer","id":"esp32"}"#),
            Ok(InboundFrame::Register {
                role: Role::Producer,
                id: Some("esp32".to_string())
            })
        );
        assert_eq!(
            InboundFrame::parse(r#"{"type":"register","role":"consumer"}"#),
            Ok(InboundFrame::Register {
                role: Role::Consumer,
                id: None
            })
        );
    }

    #[test]
    fn register_with_unknown_role_is_invalid() {
        assert!(matches!(
            InboundFrame::parse(r#"{"type":"register","role":"admin"}"#),
            Err(ProtocolError::InvalidFrame { kind: "register", .. })
        ));
    }

    #[test]
    fn untyped_object_is_telemetry() {
        let frame = InboundFrame::parse(r#"{"soil":42,"temperature":26.1}"#).unwrap();
        match frame {
            InboundFrame::Telemetry(fields) => {
                assert_eq!(fields.get("soil"), Some(&json!(42)));
            }
            other => panic!("expected telemetry, got {:?}", other),
        }
    }

    #[test]
    fn explicit_telemetry_type_is_telemetry() {
        let frame = InboundFrame::parse(r#"{"type":"telemetry","soil":40}"#).unwrap();
        assert_eq!(frame.kind(), "telemetry");
    }

    #[test]
    fn parses_command() {
        let frame = InboundFrame::parse(r#"{"type":"cmd","cmd":"pump","value":"ON"}"#).unwrap();
        match frame {
            InboundFrame::Command(cmd) => {
                assert_eq!(cmd.actuator(), "pump");
                assert_eq!(cmd.value(), &json!("ON"));
            }
            other => panic!("expected command, got {:?}", other),
        }
    }

    #[test]
    fn command_without_value_is_invalid() {
        assert!(matches!(
            InboundFrame::parse(r#"{"type":"cmd","cmd":"pump"}"#),
            Err(ProtocolError::InvalidFrame { kind: "cmd", .. })
        ));
    }

    #[test]
    fn command_without_actuator_is_invalid() {
        assert!(matches!(
            InboundFrame::parse(r#"{"type":"cmd","value":"ON"}"#),
            Err(ProtocolError::InvalidFrame { kind: "cmd", .. })
        ));
    }

    #[test]
    fn parses_ping() {
        assert_eq!(InboundFrame::parse(r#"{"type":"ping"}"#), Ok(InboundFrame::Ping));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            InboundFrame::parse("ping"),
            Err(ProtocolError::MalformedJson(_))
        ));
    }

    #[test]
    fn non_object_json_is_rejected() {
        assert_eq!(InboundFrame::parse("[1,2,3]"), Err(ProtocolError::NotAnObject));
        assert_eq!(InboundFrame::parse("42"), Err(ProtocolError::NotAnObject));
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert_eq!(
            InboundFrame::parse(r#"{"type":"subscribe"}"#),
            Err(ProtocolError::UnknownType("subscribe".to_string()))
        );
        assert!(matches!(
            InboundFrame::parse(r#"{"type":7}"#),
            Err(ProtocolError::UnknownType(_))
        ));
    }
}
