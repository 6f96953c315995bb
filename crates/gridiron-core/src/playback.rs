//! Timestamp-driven replay of a recorded event sequence.
//!
//! Two flavours exist:
//!
//! - [`PlaybackScheduler`] replays one event at a time to its own
//!   subscribers. Each wait is recomputed from a fixed anchor as the
//!   event's offset minus the real time already elapsed, so timer
//!   imprecision never accumulates across the sequence.
//! - [`RewindSource`] computes every delay once up front and schedules all
//!   timers immediately, pushing into an [`EventSink`].
//!
//! Both sort their input by `at` once at construction (stable, so equal
//! timestamps keep their input order) and never rely on source order.

use std::sync::Arc;
use std::time::Duration;

use gridiron_types::NormalizedEvent;
use tokio::time::Instant;
use tracing::debug;

use crate::buffer::EventSink;
use crate::subscribers::{SubscriberRegistry, SubscriptionId};
use crate::timer::Timers;

/// Lowest accepted playback speed.
pub const MIN_SPEED: f64 = 0.01;

/// Clamp a requested playback speed to a strictly positive minimum.
///
/// `NaN` clamps to [`MIN_SPEED`].
pub fn clamp_speed(speed: f64) -> f64 {
    speed.max(MIN_SPEED)
}

/// Offset of `at_ms` from `origin_ms`, scaled by `speed`.
#[allow(clippy::cast_precision_loss)]
fn scaled_offset(at_ms: i64, origin_ms: i64, speed: f64) -> Duration {
    let raw = at_ms.saturating_sub(origin_ms).max(0) as f64;
    Duration::from_secs_f64(raw / speed / 1000.0)
}

fn sorted_by_time(mut events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    events.sort_by_key(|e| e.at);
    events
}

/// Replays a fixed event sequence against the clock, one event at a time.
#[derive(Debug)]
pub struct PlaybackScheduler {
    events: Arc<[NormalizedEvent]>,
    speed: f64,
    subscribers: Arc<SubscriberRegistry<NormalizedEvent>>,
    timers: Timers,
}

impl PlaybackScheduler {
    /// Create a scheduler that replays in real time.
    pub fn new(events: Vec<NormalizedEvent>) -> Self {
        Self::with_speed(events, 1.0)
    }

    /// Create a scheduler that replays at `speed` times real time.
    pub fn with_speed(events: Vec<NormalizedEvent>, speed: f64) -> Self {
        Self {
            events: sorted_by_time(events).into(),
            speed: clamp_speed(speed),
            subscribers: Arc::new(SubscriberRegistry::new()),
            timers: Timers::new(),
        }
    }

    /// The events in dispatch order.
    pub fn events(&self) -> &[NormalizedEvent] {
        &self.events
    }

    /// The effective (clamped) speed.
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// Register a handler for individual events.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&NormalizedEvent) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(handler)
    }

    /// Cancel a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Start (or restart) playback from the first event.
    ///
    /// "Now" is anchored to the first event's `at`.
    pub fn start(&self) {
        self.timers.cancel_all();

        let events = Arc::clone(&self.events);
        let subscribers = Arc::clone(&self.subscribers);
        let speed = self.speed;

        self.timers.spawn(move |guard| async move {
            let Some(origin) = events.first().map(|e| e.at) else {
                return;
            };
            let anchor = Instant::now();

            for event in events.iter() {
                let due = scaled_offset(event.at, origin, speed);
                let wait = due.saturating_sub(anchor.elapsed());
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
                if guard.run(|| subscribers.dispatch(event)).is_none() {
                    return;
                }
            }

            debug!(count = events.len(), "playback finished");
        });
    }

    /// Cancel every pending delivery. Nothing fires afterwards.
    pub fn stop(&self) {
        self.timers.cancel_all();
    }
}

/// Handle to a running source. Closing (or dropping) it cancels every
/// outstanding timer.
#[derive(Debug)]
pub struct SourceHandle {
    timers: Timers,
}

impl SourceHandle {
    /// A handle with nothing to cancel.
    pub fn inert() -> Self {
        Self {
            timers: Timers::new(),
        }
    }

    /// Cancel all outstanding deliveries.
    pub fn close(&self) {
        self.timers.cancel_all();
    }
}

/// Replays events by timestamp at a speed factor, scheduling every
/// delivery up front.
#[derive(Debug, Clone)]
pub struct RewindSource {
    events: Vec<NormalizedEvent>,
    speed: f64,
}

impl RewindSource {
    /// Create a rewind source. `speed` is clamped to [`MIN_SPEED`].
    pub fn new(events: Vec<NormalizedEvent>, speed: f64) -> Self {
        Self {
            events: sorted_by_time(events),
            speed: clamp_speed(speed),
        }
    }

    /// Delivery delay of each event relative to `start`, rounded to whole
    /// milliseconds, in dispatch order.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delays(&self) -> Vec<Duration> {
        let Some(origin) = self.events.first().map(|e| e.at) else {
            return Vec::new();
        };
        self.events
            .iter()
            .map(|e| {
                let ms = scaled_offset(e.at, origin, self.speed).as_secs_f64() * 1000.0;
                Duration::from_millis(ms.round() as u64)
            })
            .collect()
    }

    /// Schedule every event into `sink`.
    ///
    /// Events sharing the same rounded delay are pushed together as one
    /// batch so their order is preserved.
    pub fn start(&self, sink: Arc<dyn EventSink>) -> SourceHandle {
        if self.events.is_empty() {
            return SourceHandle::inert();
        }

        let timers = Timers::new();
        let mut groups: Vec<(Duration, Vec<NormalizedEvent>)> = Vec::new();
        for (delay, event) in self.delays().into_iter().zip(self.events.iter().cloned()) {
            match groups.last_mut() {
                Some((last, batch)) if *last == delay => batch.push(event),
                _ => groups.push((delay, vec![event])),
            }
        }

        debug!(
            events = self.events.len(),
            timers = groups.len(),
            speed = self.speed,
            "rewind scheduled"
        );

        for (delay, batch) in groups {
            let sink = Arc::clone(&sink);
            timers.schedule_after(delay, move || sink.push_many(batch));
        }

        SourceHandle { timers }
    }
}
