//! Fan-out of the live feed to every connected viewer.
//!
//! Each accepted socket registers a [`Peer`] holding the sending half of
//! an unbounded channel; the socket task drains the other half. Removing a
//! peer drops its sender, which ends the socket task and closes the socket.
//!
//! Liveness follows the usual ping/pong sweep: every heartbeat, peers that
//! have not answered since the previous sweep are terminated, and the rest
//! are marked not-alive and sent a fresh `Ping`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use gridiron_core::{EventSink, GameSession, Timers};
use gridiron_types::{
    ConnectionId, ControlMessage, GameState, NormalizedEvent, encode_control, encode_events,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Shortest accepted heartbeat interval.
const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10);

/// Outcome of one heartbeat sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatReport {
    /// Peers terminated for missing the previous ping.
    pub terminated: usize,
    /// Peers sent a new ping.
    pub pinged: usize,
}

/// A registered viewer socket.
#[derive(Debug)]
struct Peer {
    tx: mpsc::UnboundedSender<String>,
    alive: bool,
    last_seen: DateTime<Utc>,
}

/// Registry of connected viewers plus the folded game they are watching.
#[derive(Debug, Default)]
pub struct Broadcaster {
    peers: Mutex<BTreeMap<ConnectionId, Peer>>,
    game: GameSession,
}

impl Broadcaster {
    /// Create an empty broadcaster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted socket. The returned receiver yields the
    /// text frames to write to it and ends when the peer is removed.
    pub fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        let count = {
            let mut peers = self.lock();
            peers.insert(
                id,
                Peer {
                    tx,
                    alive: true,
                    last_seen: Utc::now(),
                },
            );
            peers.len()
        };
        info!(connection_id = %id, connections = count, "viewer connected");
        (id, rx)
    }

    /// Remove a peer. Returns `false` if it was already gone.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            info!(connection_id = %id, "viewer disconnected");
        }
        removed
    }

    /// Record a `Pong` from a peer.
    pub fn mark_alive(&self, id: ConnectionId) -> bool {
        self.lock().get_mut(&id).is_some_and(|peer| {
            peer.alive = true;
            peer.last_seen = Utc::now();
            true
        })
    }

    /// When a peer last answered (or connected).
    pub fn last_seen(&self, id: ConnectionId) -> Option<DateTime<Utc>> {
        self.lock().get(&id).map(|peer| peer.last_seen)
    }

    /// Number of registered peers.
    pub fn connection_count(&self) -> usize {
        self.lock().len()
    }

    /// The game as folded from everything broadcast so far.
    pub fn snapshot(&self) -> Option<GameState> {
        self.game.snapshot()
    }

    /// Send events to every open peer as one frame.
    ///
    /// Delivery is fire-and-forget: peers whose socket task has already
    /// gone are skipped. Returns the number of peers the frame was queued for.
    pub fn broadcast(&self, events: &[NormalizedEvent]) -> usize {
        if events.is_empty() {
            return 0;
        }
        let frame = match encode_events(events) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to encode event frame");
                return 0;
            }
        };
        self.send_all(&frame)
    }

    /// Run one heartbeat sweep.
    pub fn heartbeat_tick(&self) -> HeartbeatReport {
        let ping = match encode_control(&ControlMessage::Ping {
            ts: Utc::now().timestamp_millis(),
        }) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to encode ping");
                return HeartbeatReport::default();
            }
        };

        let mut report = HeartbeatReport::default();
        self.lock().retain(|id, peer| {
            if !peer.alive {
                debug!(connection_id = %id, "terminating unresponsive viewer");
                report.terminated = report.terminated.saturating_add(1);
                return false;
            }
            peer.alive = false;
            if peer.tx.send(ping.clone()).is_ok() {
                report.pinged = report.pinged.saturating_add(1);
            }
            true
        });
        report
    }

    /// Drop every peer, ending all socket tasks.
    pub fn close_all(&self) {
        let count = std::mem::take(&mut *self.lock()).len();
        if count > 0 {
            info!(connections = count, "closing all viewer connections");
        }
    }

    fn send_all(&self, frame: &str) -> usize {
        self.lock()
            .values()
            .filter(|peer| peer.tx.send(frame.to_owned()).is_ok())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ConnectionId, Peer>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for Broadcaster {
    fn push_many(&self, events: Vec<NormalizedEvent>) {
        self.game.apply_batch(&events);
        let sent = self.broadcast(&events);
        debug!(events = events.len(), peers = sent, "broadcast batch");
    }
}

/// Run the heartbeat sweep every `interval` on `timers`.
pub fn spawn_heartbeat(broadcaster: Arc<Broadcaster>, interval: Duration, timers: &Timers) {
    timers.spawn(move |guard| async move {
        let mut ticker = tokio::time::interval(interval.max(MIN_HEARTBEAT_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.reset();
        loop {
            ticker.tick().await;
            let Some(report) = guard.run(|| broadcaster.heartbeat_tick()) else {
                return;
            };
            debug!(
                terminated = report.terminated,
                pinged = report.pinged,
                "heartbeat"
            );
        }
    });
}
