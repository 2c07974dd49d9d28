//! The relay loop.
//!
//! One task owns all relay state (registry, last-state cache, command table,
//! sequence counter) and processes [`RelayEvent`]s and heartbeat ticks one at
//! a time. Connection tasks talk to it through a [`RelayHandle`]; it talks
//! back through each connection's bounded [`Outbound`] queue using
//! `try_send` only, so no peer can stall it.
//!
//! # Event Flow
//!
//! ```text
//! socket reader ──Frame/Pong/Disconnected──► ┌────────────┐ ──Outbound──► socket writer
//!                                            │ Relay loop │
//! heartbeat ticker ────────tick────────────► └────────────┘ ──spawn──► TelemetryForwarder
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::adapters::forwarder::TelemetryForwarder;
use crate::config::RelayConfig;
use crate::domain::foundation::{ConnectionId, Timestamp};
use crate::domain::relay::{
    resolve_peer_id, CommandDeduplicator, CommandMessage, ComponentStatus, ConnectionState,
    DedupDecision, LastStateCache, ProtocolError, Role, SystemStatusRecord, TelemetryMessage,
    TelemetrySequence,
};

use super::heartbeat::HeartbeatMonitor;
use super::messages::{InboundFrame, Outbound, ProducerStatus, ServerMessage};
use super::registry::{ConnectionRegistry, DeliveryError};

/// Tunables for the relay loop.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub heartbeat_interval: Duration,
    pub command_cooldown: Duration,
    pub outbound_capacity: usize,
    pub event_capacity: usize,
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            command_cooldown: config.command_cooldown(),
            outbound_capacity: config.outbound_capacity,
            event_capacity: config.event_capacity,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

/// Input to the relay loop.
#[derive(Debug)]
pub enum RelayEvent {
    Connected {
        id: ConnectionId,
        outbound: mpsc::Sender<Outbound>,
    },
    Frame {
        id: ConnectionId,
        text: String,
    },
    Pong {
        id: ConnectionId,
    },
    Disconnected {
        id: ConnectionId,
    },
    Status {
        reply: oneshot::Sender<RelayStatus>,
    },
}

/// The relay loop is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("relay loop has stopped")]
pub struct RelayClosed;

/// Cloneable sender side of the relay loop.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    events: mpsc::Sender<RelayEvent>,
    outbound_capacity: usize,
}

impl RelayHandle {
    /// Register a new transport. Returns its id and the queue its writer drains.
    pub async fn connect(&self) -> Result<(ConnectionId, mpsc::Receiver<Outbound>), RelayClosed> {
        let id = ConnectionId::new();
        let (outbound, rx) = mpsc::channel(self.outbound_capacity);
        self.send(RelayEvent::Connected { id, outbound }).await?;
        Ok((id, rx))
    }

    pub async fn frame(&self, id: ConnectionId, text: impl Into<String>) -> Result<(), RelayClosed> {
        self.send(RelayEvent::Frame {
            id,
            text: text.into(),
        })
        .await
    }

    pub async fn pong(&self, id: ConnectionId) -> Result<(), RelayClosed> {
        self.send(RelayEvent::Pong { id }).await
    }

    pub async fn disconnect(&self, id: ConnectionId) -> Result<(), RelayClosed> {
        self.send(RelayEvent::Disconnected { id }).await
    }

    /// Snapshot of relay state. Also acts as a barrier: every event sent
    /// before this call has been processed when it returns.
    pub async fn status(&self) -> Result<RelayStatus, RelayClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayEvent::Status { reply }).await?;
        rx.await.map_err(|_| RelayClosed)
    }

    async fn send(&self, event: RelayEvent) -> Result<(), RelayClosed> {
        self.events.send(event).await.map_err(|_| RelayClosed)
    }
}

/// Point-in-time view served by `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayStatus {
    pub producer: Option<PeerSummary>,
    pub consumers: usize,
    pub unclassified: usize,
    pub connections: usize,
    pub last_sequence: Option<u64>,
    pub latest: Option<Value>,
    pub latest_received_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerSummary {
    pub id: String,
    pub connected_at: String,
}

#[derive(Debug, Clone, Copy)]
enum DropReason {
    Disconnected,
    Unwritable(DeliveryError),
    HeartbeatExpired,
}

/// Error for a frame kind the sender's state does not accept.
fn rejection_for(kind: &'static str, state: &ConnectionState) -> ProtocolError {
    match state {
        ConnectionState::Unclassified => ProtocolError::RegistrationRequired,
        ConnectionState::Producer { .. } => ProtocolError::UnexpectedForRole {
            kind,
            role: Role::Producer,
        },
        ConnectionState::Consumer { .. } => ProtocolError::UnexpectedForRole {
            kind,
            role: Role::Consumer,
        },
    }
}

/// Relay state plus the loop that drives it.
pub struct Relay {
    registry: ConnectionRegistry,
    last_state: LastStateCache,
    sequence: TelemetrySequence,
    dedup: CommandDeduplicator,
    heartbeat: HeartbeatMonitor,
    forwarder: Option<TelemetryForwarder>,
    events: mpsc::Receiver<RelayEvent>,
}

impl Relay {
    pub fn new(settings: RelaySettings, forwarder: Option<TelemetryForwarder>) -> (Self, RelayHandle) {
        let (tx, rx) = mpsc::channel(settings.event_capacity);
        let relay = Self {
            registry: ConnectionRegistry::new(),
            last_state: LastStateCache::new(),
            sequence: TelemetrySequence::new(),
            dedup: CommandDeduplicator::new(settings.command_cooldown),
            heartbeat: HeartbeatMonitor::new(settings.heartbeat_interval),
            forwarder,
            events: rx,
        };
        let handle = RelayHandle {
            events: tx,
            outbound_capacity: settings.outbound_capacity,
        };
        (relay, handle)
    }

    /// Build the relay and run it on a new task.
    pub fn spawn(
        settings: RelaySettings,
        forwarder: Option<TelemetryForwarder>,
    ) -> (RelayHandle, JoinHandle<()>) {
        let (relay, handle) = Self::new(settings, forwarder);
        (handle, tokio::spawn(relay.run()))
    }

    /// Run until every [`RelayHandle`] is dropped.
    pub async fn run(mut self) {
        tracing::info!(
            heartbeat_secs = self.heartbeat.interval().as_secs(),
            cooldown_ms = self.dedup.cooldown().as_millis() as u64,
            forwarding = self.forwarder.is_some(),
            "Relay loop started"
        );
        let mut ticker = self.heartbeat.ticker();

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = ticker.tick() => self.on_heartbeat(),
            }
        }

        tracing::info!("Relay loop stopped");
    }

    fn handle_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connected { id, outbound } => {
                self.registry.insert(id, outbound);
                tracing::debug!(
                    connection_id = %id,
                    connections = self.registry.len(),
                    "Connection opened"
                );
            }
            RelayEvent::Frame { id, text } => self.on_frame(id, text),
            RelayEvent::Pong { id } => {
                if let Some(entry) = self.registry.get_mut(&id) {
                    entry.confirm_alive(Instant::now());
                    tracing::trace!(connection_id = %id, "Pong received");
                }
            }
            RelayEvent::Disconnected { id } => self.drop_connection(id, DropReason::Disconnected),
            RelayEvent::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn on_frame(&mut self, id: ConnectionId, text: String) {
        let Some(state) = self.registry.get(&id).map(|e| e.state().clone()) else {
            tracing::debug!(connection_id = %id, "Frame from unknown connection ignored");
            return;
        };

        let frame = match InboundFrame::parse(&text) {
            Ok(frame) => frame,
            Err(e) => return self.reject(id, e),
        };

        let result = match (frame, state) {
            (InboundFrame::Register { role, id: requested }, _) => {
                self.on_register(id, role, requested.as_deref())
            }
            (_, ConnectionState::Unclassified) => Err(ProtocolError::RegistrationRequired),
            (InboundFrame::Telemetry(fields), ConnectionState::Producer { peer_id }) => {
                self.on_telemetry(text, fields, &peer_id);
                Ok(())
            }
            (InboundFrame::Command(command), ConnectionState::Consumer { .. }) => {
                self.on_command(id, text, command);
                Ok(())
            }
            (InboundFrame::Ping, ConnectionState::Consumer { .. }) => {
                self.reply(id, ServerMessage::pong(Timestamp::now().to_rfc3339()));
                Ok(())
            }
            (frame, state) => Err(rejection_for(frame.kind(), &state)),
        };

        if let Err(e) = result {
            self.reject(id, e);
        }
    }

    fn on_register(
        &mut self,
        id: ConnectionId,
        role: Role,
        requested: Option<&str>,
    ) -> Result<(), ProtocolError> {
        let peer_id = resolve_peer_id(requested, id);
        let displaced = self.registry.classify(id, role, peer_id.clone())?;

        tracing::info!(
            connection_id = %id,
            role = %role,
            peer_id = %peer_id,
            "Connection registered"
        );
        self.reply(id, ServerMessage::ack(role, peer_id.clone()));

        match role {
            Role::Producer => {
                // Nothing has been sent to this producer yet.
                self.dedup.reset();
                let status = match displaced {
                    Some(previous) => {
                        tracing::warn!(
                            connection_id = %previous.id(),
                            peer_id = previous.state().peer_id().unwrap_or_default(),
                            "Producer replaced by new registration"
                        );
                        let _ = previous.deliver(Outbound::Close);
                        if let Some(old) = previous.state().peer_id() {
                            self.log_producer(ComponentStatus::Offline, old);
                        }
                        ProducerStatus::Replaced
                    }
                    None => ProducerStatus::Connected,
                };
                self.log_producer(ComponentStatus::Online, &peer_id);
                self.notify_consumers(&ServerMessage::producer_status(status, peer_id));
            }
            Role::Consumer => self.catch_up(id),
        }
        Ok(())
    }

    fn catch_up(&mut self, id: ConnectionId) {
        let Some(message) = self.last_state.get().cloned() else {
            return;
        };
        let Some(entry) = self.registry.get_mut(&id) else {
            return;
        };

        match entry.deliver_telemetry(&message) {
            Ok(true) => tracing::debug!(
                connection_id = %id,
                sequence = message.sequence(),
                "Catch-up delivered"
            ),
            Ok(false) => {}
            Err(e) => self.drop_connection(id, DropReason::Unwritable(e)),
        }
    }

    fn on_telemetry(&mut self, raw: String, fields: Map<String, Value>, producer: &str) {
        let sequence = self.sequence.next();
        let message = Arc::new(TelemetryMessage::new(
            sequence,
            Timestamp::now(),
            raw,
            fields,
        ));
        self.last_state.store(Arc::clone(&message));

        let mut delivered = 0usize;
        let mut failed = Vec::new();
        for entry in self.registry.consumers_mut() {
            match entry.deliver_telemetry(&message) {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(e) => failed.push((entry.id(), e)),
            }
        }
        for (id, e) in failed {
            self.drop_connection(id, DropReason::Unwritable(e));
        }

        tracing::debug!(sequence, consumers = delivered, "Telemetry broadcast");

        if let Some(forwarder) = &self.forwarder {
            forwarder.forward(&message, producer);
        }
    }

    fn on_command(&mut self, from: ConnectionId, raw: String, command: CommandMessage) {
        let Some(producer_id) = self.registry.producer_id() else {
            tracing::debug!(
                connection_id = %from,
                actuator = command.actuator(),
                "Command rejected, no producer connected"
            );
            self.reply(from, ServerMessage::producer_not_connected());
            return;
        };

        let now = Instant::now();
        let DedupDecision::Forward(reason) = self.dedup.evaluate(&command, now) else {
            tracing::debug!(
                connection_id = %from,
                actuator = command.actuator(),
                value = %command.value(),
                "duplicate command ignored"
            );
            return;
        };

        let delivered = self
            .registry
            .get(&producer_id)
            .map(|producer| producer.deliver(Outbound::Text(raw)));

        match delivered {
            Some(Ok(())) => {
                self.dedup.record(&command, now);
                tracing::info!(
                    connection_id = %from,
                    actuator = command.actuator(),
                    value = %command.value(),
                    reason = ?reason,
                    "Command forwarded to producer"
                );
            }
            Some(Err(e)) => {
                tracing::warn!(
                    actuator = command.actuator(),
                    error = %e,
                    "Producer unwritable, command not delivered"
                );
                self.drop_connection(producer_id, DropReason::Unwritable(e));
                self.reply(from, ServerMessage::producer_not_connected());
            }
            None => self.reply(from, ServerMessage::producer_not_connected()),
        }
    }

    fn on_heartbeat(&mut self) {
        let sweep = self.heartbeat.sweep(&mut self.registry);

        for id in sweep.expired {
            self.drop_connection(id, DropReason::HeartbeatExpired);
        }
        for (id, e) in sweep.unreachable {
            self.drop_connection(id, DropReason::Unwritable(e));
        }

        tracing::trace!(pinged = sweep.pinged, "Heartbeat sweep");
    }

    fn reject(&mut self, id: ConnectionId, error: ProtocolError) {
        tracing::warn!(connection_id = %id, error = %error, "Protocol error, frame dropped");
        if error.is_reported_to_peer() {
            self.reply(id, ServerMessage::error(error.to_string()));
        }
    }

    fn reply(&mut self, id: ConnectionId, message: ServerMessage) {
        let result = match self.registry.get(&id) {
            Some(entry) => entry.deliver(Outbound::Text(message.to_json())),
            None => return,
        };
        if let Err(e) = result {
            self.drop_connection(id, DropReason::Unwritable(e));
        }
    }

    fn notify_consumers(&mut self, message: &ServerMessage) {
        let text = message.to_json();
        let failed: Vec<_> = self
            .registry
            .consumers()
            .filter_map(|entry| {
                entry
                    .deliver(Outbound::Text(text.clone()))
                    .err()
                    .map(|e| (entry.id(), e))
            })
            .collect();

        for (id, e) in failed {
            self.drop_connection(id, DropReason::Unwritable(e));
        }
    }

    /// Remove a connection and run role-specific cleanup.
    ///
    /// Dropping the entry drops the writer queue's sender, which ends the
    /// writer task even when the close frame itself cannot be queued.
    fn drop_connection(&mut self, id: ConnectionId, reason: DropReason) {
        let Some(entry) = self.registry.remove(&id) else {
            return;
        };
        let _ = entry.deliver(Outbound::Close);

        match reason {
            DropReason::Disconnected => tracing::info!(
                connection_id = %id,
                role = ?entry.state().role(),
                remaining = self.registry.len(),
                "Connection closed"
            ),
            DropReason::Unwritable(e) => tracing::warn!(
                connection_id = %id,
                role = ?entry.state().role(),
                error = %e,
                "Connection pruned, outbound queue rejected frame"
            ),
            DropReason::HeartbeatExpired => tracing::warn!(
                connection_id = %id,
                role = ?entry.state().role(),
                since_last_pong = ?entry.last_pong().map(|at| at.elapsed()),
                "Connection terminated, heartbeat missed"
            ),
        }

        if let ConnectionState::Producer { peer_id } = entry.state() {
            self.dedup.reset();
            self.log_producer(ComponentStatus::Offline, peer_id);
            self.notify_consumers(&ServerMessage::producer_status(
                ProducerStatus::Disconnected,
                peer_id.clone(),
            ));
        }
    }

    fn log_producer(&self, status: ComponentStatus, peer_id: &str) {
        if let Some(forwarder) = &self.forwarder {
            forwarder.forward_status(SystemStatusRecord::producer(status, peer_id, Timestamp::now()));
        }
    }

    fn status(&self) -> RelayStatus {
        let latest = self.last_state.get();
        RelayStatus {
            producer: self.registry.producer().map(|entry| PeerSummary {
                id: entry.state().peer_id().unwrap_or_default().to_string(),
                connected_at: entry.connected_at().to_rfc3339(),
            }),
            consumers: self.registry.consumer_count(),
            unclassified: self.registry.unclassified_count(),
            connections: self.registry.len(),
            last_sequence: self.last_state.sequence(),
            latest: latest.map(|m| m.to_json()),
            latest_received_at: latest.map(|m| m.received_at().to_rfc3339()),
        }
    }
}
