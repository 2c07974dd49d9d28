//! Protocol error taxonomy.

use thiserror::Error;

use super::role::Role;

/// A frame the relay could not act on.
///
/// None of these close the connection. Only the registration errors are
/// reported back to the peer; the rest are logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("message must be a JSON object")]
    NotAnObject,

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("invalid '{kind}' message: {reason}")]
    InvalidFrame { kind: &'static str, reason: String },

    #[error("registration required")]
    RegistrationRequired,

    #[error("already registered")]
    AlreadyRegistered,

    #[error("'{kind}' messages are not accepted from a {role}")]
    UnexpectedForRole { kind: &'static str, role: Role },
}

impl ProtocolError {
    /// Creates an invalid frame error.
    pub fn invalid_frame(kind: &'static str, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidFrame {
            kind,
            reason: reason.into(),
        }
    }

    /// Whether the peer is told about this error with an error frame.
    pub fn is_reported_to_peer(&self) -> bool {
        matches!(
            self,
            ProtocolError::RegistrationRequired | ProtocolError::AlreadyRegistered
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_errors_are_reported() {
        assert!(ProtocolError::RegistrationRequired.is_reported_to_peer());
        assert!(ProtocolError::AlreadyRegistered.is_reported_to_peer());
        assert!(!ProtocolError::NotAnObject.is_reported_to_peer());
        assert!(!ProtocolError::UnknownType("x".into()).is_reported_to_peer());
    }

    #[test]
    fn messages_match_wire_text() {
        assert_eq!(
            ProtocolError::RegistrationRequired.to_string(),
            "registration required"
        );
        assert_eq!(
            ProtocolError::UnexpectedForRole {
                kind: "cmd",
                role: Role::Producer
            }
            .to_string(),
            "'cmd' messages are not accepted from a producer"
        );
    }
}
