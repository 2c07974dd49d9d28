//! Connection roles and the per-connection classification state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ConnectionId;

/// Role a connection declares in its registration message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The embedded telemetry source (at most one at a time).
    Producer,
    /// A dashboard or mobile client.
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

/// Classification of a connection.
///
/// Every connection starts `Unclassified` and moves to exactly one role on
/// registration. There is no transition back and no role change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Unclassified,
    Producer { peer_id: String },
    Consumer { peer_id: String },
}

impl ConnectionState {
    /// Build the classified state for a role.
    pub fn classified(role: Role, peer_id: String) -> Self {
        match role {
            Role::Producer => ConnectionState::Producer { peer_id },
            Role::Consumer => ConnectionState::Consumer { peer_id },
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            ConnectionState::Unclassified => None,
            ConnectionState::Producer { .. } => Some(Role::Producer),
            ConnectionState::Consumer { .. } => Some(Role::Consumer),
        }
    }

    pub fn peer_id(&self) -> Option<&str> {
        match self {
            ConnectionState::Unclassified => None,
            ConnectionState::Producer { peer_id } | ConnectionState::Consumer { peer_id } => {
                Some(peer_id)
            }
        }
    }

    pub fn is_classified(&self) -> bool {
        !matches!(self, ConnectionState::Unclassified)
    }

    pub fn is_consumer(&self) -> bool {
        matches!(self, ConnectionState::Consumer { .. })
    }
}

/// Pick the stable identifier for a registering peer.
///
/// A blank or missing client-supplied id falls back to the connection id.
pub fn resolve_peer_id(requested: Option<&str>, connection_id: ConnectionId) -> String {
    requested
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| connection_id.to_string())
}
