//! Heartbeat monitor.
//!
//! Per connection: `Alive → (ping, no pong by next tick) → PresumedDead → Terminated`.
//!
//! Each tick first collects connections still `PresumedDead` from the previous
//! tick, then pings every other connection and marks it unconfirmed. A pong
//! in between flips it back to `Alive`. The relay loop performs the actual
//! removal so that termination shares the normal disconnect cleanup.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::domain::foundation::ConnectionId;

use super::messages::Outbound;
use super::registry::{ConnectionRegistry, DeliveryError, Liveness};

/// Result of one heartbeat tick.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HeartbeatSweep {
    /// Missed the previous ping; to be closed and removed.
    pub expired: Vec<ConnectionId>,
    /// Ping could not be queued; to be removed.
    pub unreachable: Vec<(ConnectionId, DeliveryError)>,
    /// Pings queued this tick.
    pub pinged: usize,
}

/// Drives periodic liveness checks over the registry.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Duration,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ticker whose first tick is one full interval from now.
    pub fn ticker(&self) -> Interval {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    pub fn sweep(&self, registry: &mut ConnectionRegistry) -> HeartbeatSweep {
        let mut sweep = HeartbeatSweep::default();

        for entry in registry.iter_mut() {
            match entry.liveness() {
                Liveness::PresumedDead => sweep.expired.push(entry.id()),
                Liveness::Alive => {
                    entry.mark_unconfirmed();
                    match entry.deliver(Outbound::Ping) {
                        Ok(()) => sweep.pinged += 1,
                        Err(e) => sweep.unreachable.push((entry.id(), e)),
                    }
                }
            }
        }

        sweep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn connect(registry: &mut ConnectionRegistry) -> (ConnectionId, mpsc::Receiver<Outbound>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(4);
        registry.insert(id, tx);
        (id, rx)
    }

    #[test]
    fn first_sweep_pings_everyone() {
        let monitor = HeartbeatMonitor::new(Duration::from_secs(30));
        let mut registry = ConnectionRegistry::new();
        let (a, mut rx_a) = connect(&mut registry);
        let (_b, mut rx_b) = connect(&mut registry);

        let sweep = monitor.sweep(&mut registry);

        assert_eq!(sweep.pinged, 2);
        assert!(sweep.expired.is_empty());
        assert_eq!(rx_a.try_recv().unwrap(), Outbound::Ping);
        assert_eq!(rx_b.try_recv().unwrap(), Outbound::Ping);
        assert_eq!(
            registry.get(&a).unwrap().liveness(),
            Liveness::PresumedDead
        );
    }

    #[test]
    fn unanswered_ping_expires_on_next_sweep() {
        let monitor = HeartbeatMonitor::new(Duration::from_secs(30));
        let mut registry = ConnectionRegistry::new();
        let (silent, _rx1) = connect(&mut registry);
        let (responsive, _rx2) = connect(&mut registry);

        monitor.sweep(&mut registry);
        registry
            .get_mut(&responsive)
            .unwrap()
            .confirm_alive(Instant::now());
        let sweep = monitor.sweep(&mut registry);

        assert_eq!(sweep.expired, vec![silent]);
        assert_eq!(sweep.pinged, 1);
    }

    #[test]
    fn closed_writer_is_reported_unreachable() {
        let monitor = HeartbeatMonitor::new(Duration::from_secs(30));
        let mut registry = ConnectionRegistry::new();
        let (id, rx) = connect(&mut registry);
        drop(rx);

        let sweep = monitor.sweep(&mut registry);

        assert_eq!(sweep.unreachable, vec![(id, DeliveryError::Closed)]);
        assert_eq!(sweep.pinged, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_waits_one_interval_before_first_tick() {
        let monitor = HeartbeatMonitor::new(Duration::from_secs(30));
        let start = Instant::now();
        let mut ticker = monitor.ticker();

        ticker.tick().await;
        assert!(Instant::now() - start >= Duration::from_secs(30));
    }
}
