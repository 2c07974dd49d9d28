//! Connection registry: every open connection, its role and its writer queue.
//!
//! ```text
//! Registry
//! ├── conn-a  Producer { esp32 }      ◄── producer slot
//! ├── conn-b  Consumer { dash-1 }
//! ├── conn-c  Consumer { phone }
//! └── conn-d  Unclassified
//! ```
//!
//! Owned by the relay loop, so nothing here is synchronized. The producer slot
//! holds at most one connection; classifying a second producer evicts the
//! first and hands its entry back to the caller.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;

use crate::domain::foundation::{ConnectionId, Timestamp};
use crate::domain::relay::{ConnectionState, ProtocolError, Role, TelemetryMessage};

use super::messages::Outbound;

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("outbound queue full")]
    QueueFull,

    #[error("connection closed")]
    Closed,
}

/// Heartbeat state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Answered the last ping (or has not been pinged yet).
    Alive,
    /// Pinged and not yet answered.
    PresumedDead,
}

/// One open connection.
#[derive(Debug)]
pub struct ConnectionEntry {
    id: ConnectionId,
    state: ConnectionState,
    outbound: mpsc::Sender<Outbound>,
    liveness: Liveness,
    last_pong: Option<Instant>,
    /// Sequence of the newest telemetry queued for this connection.
    last_sequence: Option<u64>,
    connected_at: Timestamp,
}

impl ConnectionEntry {
    fn new(id: ConnectionId, outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            id,
            state: ConnectionState::Unclassified,
            outbound,
            liveness: Liveness::Alive,
            last_pong: None,
            last_sequence: None,
            connected_at: Timestamp::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn last_pong(&self) -> Option<Instant> {
        self.last_pong
    }

    pub fn connected_at(&self) -> Timestamp {
        self.connected_at
    }

    /// Queue a frame without waiting.
    pub fn deliver(&self, frame: Outbound) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Queue a telemetry message unless this connection already has it.
    ///
    /// Returns `Ok(false)` when skipped. Guarantees a sequence number reaches a
    /// connection at most once, whether via catch-up or broadcast.
    pub fn deliver_telemetry(&mut self, message: &TelemetryMessage) -> Result<bool, DeliveryError> {
        if self
            .last_sequence
            .is_some_and(|seen| seen >= message.sequence())
        {
            return Ok(false);
        }
        self.deliver(Outbound::Text(message.raw().to_string()))?;
        self.last_sequence = Some(message.sequence());
        Ok(true)
    }

    /// A pong arrived.
    pub fn confirm_alive(&mut self, now: Instant) {
        self.liveness = Liveness::Alive;
        self.last_pong = Some(now);
    }

    /// A ping is about to go out.
    pub fn mark_unconfirmed(&mut self) {
        self.liveness = Liveness::PresumedDead;
    }
}

/// All open connections plus the producer slot.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    producer: Option<ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly accepted connection as `Unclassified`.
    pub fn insert(&mut self, id: ConnectionId, outbound: mpsc::Sender<Outbound>) {
        self.connections
            .insert(id, ConnectionEntry::new(id, outbound));
    }

    /// Forget a connection. Clears the producer slot if it held it.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<ConnectionEntry> {
        let entry = self.connections.remove(id)?;
        if self.producer == Some(*id) {
            self.producer = None;
        }
        Some(entry)
    }

    /// Assign a role to an unclassified connection.
    ///
    /// For `Producer`, any previous producer is removed from the registry and
    /// returned so the caller can close it. Unknown ids are a no-op.
    pub fn classify(
        &mut self,
        id: ConnectionId,
        role: Role,
        peer_id: String,
    ) -> Result<Option<ConnectionEntry>, ProtocolError> {
        let Some(entry) = self.connections.get_mut(&id) else {
            return Ok(None);
        };
        if entry.state.is_classified() {
            return Err(ProtocolError::AlreadyRegistered);
        }
        entry.state = ConnectionState::classified(role, peer_id);

        if role != Role::Producer {
            return Ok(None);
        }
        let displaced = self
            .producer
            .replace(id)
            .filter(|previous| *previous != id)
            .and_then(|previous| self.connections.remove(&previous));
        Ok(displaced)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&ConnectionEntry> {
        self.connections.get(id)
    }

    pub fn get_mut(&mut self, id: &ConnectionId) -> Option<&mut ConnectionEntry> {
        self.connections.get_mut(id)
    }

    pub fn producer_id(&self) -> Option<ConnectionId> {
        self.producer
    }

    pub fn producer(&self) -> Option<&ConnectionEntry> {
        self.producer.and_then(|id| self.connections.get(&id))
    }

    pub fn consumers(&self) -> impl Iterator<Item = &ConnectionEntry> {
        self.connections.values().filter(|e| e.state.is_consumer())
    }

    pub fn consumers_mut(&mut self) -> impl Iterator<Item = &mut ConnectionEntry> {
        self.connections
            .values_mut()
            .filter(|e| e.state.is_consumer())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ConnectionEntry> {
        self.connections.values_mut()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers().count()
    }

    pub fn unclassified_count(&self) -> usize {
        self.connections
            .values()
            .filter(|e| !e.state.is_classified())
            .count()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn connect(registry: &mut ConnectionRegistry) -> (ConnectionId, mpsc::Receiver<Outbound>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(4);
        registry.insert(id, tx);
        (id, rx)
    }

    fn telemetry(sequence: u64) -> TelemetryMessage {
        TelemetryMessage::new(
            sequence,
            Timestamp::now(),
            format!(r#"{{"soil":{}}}"#, sequence),
            Map::new(),
        )
    }

    #[test]
    fn insert_starts_unclassified_and_alive() {
        let mut registry = ConnectionRegistry::new();
        let (id, _rx) = connect(&mut registry);

        let entry = registry.get(&id).unwrap();
        assert_eq!(entry.state(), &ConnectionState::Unclassified);
        assert_eq!(entry.liveness(), Liveness::Alive);
        assert_eq!(registry.unclassified_count(), 1);
    }

    #[test]
    fn classify_consumer_counts_it() {
        let mut registry = ConnectionRegistry::new();
        let (id, _rx) = connect(&mut registry);

        let displaced = registry
            .classify(id, Role::Consumer, "dash".to_string())
            .unwrap();
        assert!(displaced.is_none());
        assert_eq!(registry.consumer_count(), 1);
        assert_eq!(registry.producer_id(), None);
    }

    #[test]
    fn classify_twice_is_rejected() {
        let mut registry = ConnectionRegistry::new();
        let (id, _rx) = connect(&mut registry);
        registry
            .classify(id, Role::Consumer, "dash".to_string())
            .unwrap();

        assert_eq!(
            registry
                .classify(id, Role::Producer, "dash".to_string())
                .unwrap_err(),
            ProtocolError::AlreadyRegistered
        );
        assert!(registry.get(&id).unwrap().state().is_consumer());
    }

    #[test]
    fn second_producer_displaces_first() {
        let mut registry = ConnectionRegistry::new();
        let (first, _rx1) = connect(&mut registry);
        let (second, _rx2) = connect(&mut registry);

        registry
            .classify(first, Role::Producer, "esp-a".to_string())
            .unwrap();
        let displaced = registry
            .classify(second, Role::Producer, "esp-b".to_string())
            .unwrap()
            .unwrap();

        assert_eq!(displaced.id(), first);
        assert_eq!(registry.producer_id(), Some(second));
        assert!(registry.get(&first).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removing_producer_clears_slot() {
        let mut registry = ConnectionRegistry::new();
        let (id, _rx) = connect(&mut registry);
        registry
            .classify(id, Role::Producer, "esp".to_string())
            .unwrap();

        assert!(registry.remove(&id).is_some());
        assert!(registry.producer().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn classify_unknown_connection_is_noop() {
        let mut registry = ConnectionRegistry::new();
        let result = registry.classify(ConnectionId::new(), Role::Producer, "esp".to_string());
        assert_eq!(result.unwrap().map(|e| e.id()), None);
        assert_eq!(registry.producer_id(), None);
    }

    #[test]
    fn deliver_reports_full_and_closed_queues() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(1);
        registry.insert(id, tx);
        let entry = registry.get(&id).unwrap();

        assert!(entry.deliver(Outbound::Ping).is_ok());
        assert_eq!(entry.deliver(Outbound::Ping), Err(DeliveryError::QueueFull));

        drop(rx);
        assert_eq!(entry.deliver(Outbound::Ping), Err(DeliveryError::Closed));
    }

    #[test]
    fn deliver_telemetry_skips_already_seen_sequences() {
        let mut registry = ConnectionRegistry::new();
        let (id, mut rx) = connect(&mut registry);
        let entry = registry.get_mut(&id).unwrap();

        assert_eq!(entry.deliver_telemetry(&telemetry(1)), Ok(true));
        assert_eq!(entry.deliver_telemetry(&telemetry(1)), Ok(false));
        assert_eq!(entry.deliver_telemetry(&telemetry(2)), Ok(true));
        assert_eq!(entry.last_sequence, Some(2));

        assert_eq!(rx.try_recv().unwrap(), Outbound::Text(r#"{"soil":1}"#.to_string()));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Text(r#"{"soil":2}"#.to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn failed_telemetry_delivery_does_not_advance_sequence() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(1);
        registry.insert(id, tx);
        drop(rx);

        let entry = registry.get_mut(&id).unwrap();
        assert_eq!(entry.deliver_telemetry(&telemetry(1)), Err(DeliveryError::Closed));
        assert_eq!(entry.last_sequence, None);
    }

    #[test]
    fn liveness_transitions() {
        let mut registry = ConnectionRegistry::new();
        let (id, _rx) = connect(&mut registry);
        let entry = registry.get_mut(&id).unwrap();

        entry.mark_unconfirmed();
        assert_eq!(entry.liveness(), Liveness::PresumedDead);

        let now = Instant::now();
        entry.confirm_alive(now);
        assert_eq!(entry.liveness(), Liveness::Alive);
        assert_eq!(entry.last_pong(), Some(now));
    }
}
