//! Synthetic game generator used when no live connection exists.
//!
//! [`DemoSource`] opens a game immediately, then runs two timed loops: a
//! game clock that ticks down by a fixed amount per tick, and a play loop
//! that snaps a play and reports its result a little later. The broadcaster
//! runs the same generator with a slower play cadence.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use gridiron_types::{EventKind, GameState, NormalizedEvent, PlayResult, QUARTER_LENGTH_MS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::buffer::EventSink;
use crate::reducer::apply_event;
use crate::timer::Timers;

/// Smallest generated gain, inclusive.
const MIN_GAIN: i32 = 3;

/// Largest generated gain, exclusive.
const MAX_GAIN: i32 = 12;

/// Gain at which a generated play is flagged as a first down.
const FIRST_DOWN_GAIN: i32 = 10;

/// Quarters in a regulation game.
const QUARTERS: u32 = 4;

/// Cadence settings for a [`DemoSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// Interval between `ClockUpdate` events.
    pub clock_tick: Duration,
    /// Game-clock milliseconds removed per tick.
    pub clock_decrement_ms: u32,
    /// Interval between `PlayStart` events.
    pub play_interval: Duration,
    /// Delay between a `PlayStart` and its `PlayEnd`.
    pub play_duration: Duration,
    /// Fixed RNG seed. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            clock_tick: Duration::from_millis(1000),
            clock_decrement_ms: 1000,
            play_interval: Duration::from_millis(3000),
            play_duration: Duration::from_millis(2000),
            seed: None,
        }
    }
}

impl DemoConfig {
    /// Cadence used by the broadcaster's demo ticker: a play every 5.2 s.
    pub fn broadcaster() -> Self {
        Self {
            play_interval: Duration::from_millis(5200),
            ..Self::default()
        }
    }
}

/// Mutable generator state shared by the two loops.
struct DemoState {
    seq: u64,
    game: GameState,
    rng: StdRng,
}

impl DemoState {
    /// Stamp `kind` with the next sequence number and fold it into the
    /// generator's own view of the game.
    fn emit(&mut self, kind: EventKind) -> NormalizedEvent {
        self.seq = self.seq.saturating_add(1);
        let event = NormalizedEvent::new(self.seq, Utc::now().timestamp_millis(), kind);
        self.game = apply_event(Some(&self.game), &event);
        event
    }

    fn kickoff(&mut self) -> Vec<NormalizedEvent> {
        let game_id = format!("demo-{}", self.seq.saturating_add(1));
        vec![
            self.emit(EventKind::GameStart {
                game_id,
                home: "HOME".to_owned(),
                away: "AWAY".to_owned(),
            }),
            self.emit(EventKind::QuarterStart {
                quarter: 1,
                clock_ms: QUARTER_LENGTH_MS,
            }),
        ]
    }

    /// One clock tick. When a quarter has expired, the tick opens the next
    /// quarter instead (or a new game after the fourth).
    fn clock_tick(&mut self, decrement_ms: u32) -> Vec<NormalizedEvent> {
        if self.game.clock_ms == 0 {
            if self.game.quarter >= QUARTERS {
                return self.kickoff();
            }
            let quarter = self.game.quarter.saturating_add(1);
            return vec![self.emit(EventKind::QuarterStart {
                quarter,
                clock_ms: QUARTER_LENGTH_MS,
            })];
        }
        let clock_ms = self.game.clock_ms.saturating_sub(decrement_ms);
        vec![self.emit(EventKind::ClockUpdate { clock_ms })]
    }

    fn play_start(&mut self) -> NormalizedEvent {
        let GameState {
            down,
            distance,
            yardline,
            ..
        } = self.game;
        self.emit(EventKind::PlayStart {
            down,
            distance,
            yardline,
        })
    }

    fn play_end(&mut self) -> NormalizedEvent {
        let yards = self.rng.random_range(MIN_GAIN..MAX_GAIN);
        self.emit(EventKind::PlayEnd {
            result: PlayResult {
                yards,
                first_down: yards >= FIRST_DOWN_GAIN,
                touchdown: None,
            },
        })
    }
}

/// An interval whose first tick is one full period away. Missed ticks are
/// delayed rather than bursted.
fn delayed_interval(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.reset();
    ticker
}

/// Synthetic event source.
///
/// `seq` keeps increasing across restarts of the same source.
pub struct DemoSource {
    sink: Arc<dyn EventSink>,
    config: DemoConfig,
    state: Arc<Mutex<DemoState>>,
    timers: Timers,
}

impl DemoSource {
    /// Create a source with the default client cadence.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self::with_config(sink, DemoConfig::default())
    }

    /// Create a source with explicit cadence settings.
    pub fn with_config(sink: Arc<dyn EventSink>, config: DemoConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            sink,
            config,
            state: Arc::new(Mutex::new(DemoState {
                seq: 0,
                game: GameState::default(),
                rng,
            })),
            timers: Timers::new(),
        }
    }

    /// Emit the opening events and start both loops.
    pub fn start(&self) {
        self.timers.cancel_all();

        let opening = lock(&self.state).kickoff();
        self.sink.push_many(opening);

        let tick = self.config.clock_tick;
        let decrement = self.config.clock_decrement_ms;
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        self.timers.spawn(move |guard| async move {
            let mut ticker = delayed_interval(tick);
            loop {
                ticker.tick().await;
                let emitted = guard.run(|| {
                    let events = lock(&state).clock_tick(decrement);
                    sink.push_many(events);
                });
                if emitted.is_none() {
                    return;
                }
            }
        });

        let interval = self.config.play_interval;
        let duration = self.config.play_duration;
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        self.timers.spawn(move |guard| async move {
            let mut ticker = delayed_interval(interval);
            loop {
                ticker.tick().await;
                let started = guard.run(|| {
                    let start = lock(&state).play_start();
                    sink.push_many(vec![start]);
                });
                if started.is_none() {
                    return;
                }

                tokio::time::sleep(duration).await;
                let ended = guard.run(|| {
                    let end = lock(&state).play_end();
                    debug!(seq = end.seq, "demo play finished");
                    sink.push_many(vec![end]);
                });
                if ended.is_none() {
                    return;
                }
            }
        });

        info!(
            clock_tick_ms = tick.as_millis(),
            play_interval_ms = interval.as_millis(),
            "demo source started"
        );
    }

    /// Cancel both loops. Nothing is emitted afterwards.
    pub fn stop(&self) {
        self.timers.cancel_all();
        debug!("demo source stopped");
    }

    /// The generator's own folded view of the game.
    pub fn game(&self) -> GameState {
        lock(&self.state).game.clone()
    }
}

impl std::fmt::Debug for DemoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoSource")
            .field("config", &self.config)
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

fn lock(state: &Mutex<DemoState>) -> MutexGuard<'_, DemoState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::buffer::EventBuffer;

    fn collect(buffer: &EventBuffer) -> Arc<Mutex<Vec<NormalizedEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        buffer.subscribe(move |batch| sink.lock().unwrap().extend_from_slice(batch));
        seen
    }

    fn seeded() -> DemoConfig {
        DemoConfig {
            seed: Some(7),
            ..DemoConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn opens_with_game_and_quarter_start() {
        let buffer = Arc::new(EventBuffer::new());
        let seen = collect(&buffer);
        let demo = DemoSource::with_config(buffer.clone(), seeded());
        demo.start();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].type_name(), "GameStart");
        assert_eq!(
            seen[1].kind,
            EventKind::QuarterStart {
                quarter: 1,
                clock_ms: 900_000
            }
        );
        demo.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn clock_ticks_down_by_fixed_decrement() {
        let buffer = Arc::new(EventBuffer::new());
        let seen = collect(&buffer);
        let demo = DemoSource::with_config(buffer.clone(), seeded());
        demo.start();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let clocks: Vec<u32> = seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::ClockUpdate { clock_ms } => Some(clock_ms),
                _ => None,
            })
            .collect();
        assert_eq!(clocks, vec![899_000, 898_000]);
        demo.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn plays_follow_cadence_with_bounded_gains() {
        let buffer = Arc::new(EventBuffer::new());
        let seen = collect(&buffer);
        let demo = DemoSource::with_config(buffer.clone(), seeded());
        demo.start();

        tokio::time::sleep(Duration::from_millis(4500)).await;
        let starts = seen
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.type_name() == "PlayStart")
            .count();
        assert_eq!(starts, 1);
        let ends = seen
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.type_name() == "PlayEnd")
            .count();
        assert_eq!(ends, 0);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let events = seen.lock().unwrap().clone();
        let results: Vec<PlayResult> = events
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::PlayEnd { result } => Some(result),
                _ => None,
            })
            .collect();
        assert_eq!(results.len(), 1);
        for result in results {
            assert!((MIN_GAIN..MAX_GAIN).contains(&result.yards));
            assert_eq!(result.first_down, result.yards >= FIRST_DOWN_GAIN);
        }
        demo.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn seq_is_strictly_increasing() {
        let buffer = Arc::new(EventBuffer::new());
        let seen = collect(&buffer);
        let demo = DemoSource::with_config(buffer.clone(), seeded());
        demo.start();
        tokio::time::sleep(Duration::from_secs(20)).await;
        demo.stop();

        let seqs: Vec<u64> = seen.lock().unwrap().iter().map(|e| e.seq).collect();
        assert!(seqs.len() > 20);
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_emission() {
        let buffer = Arc::new(EventBuffer::new());
        let seen = collect(&buffer);
        let demo = DemoSource::with_config(buffer.clone(), seeded());
        demo.start();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        demo.stop();
        let count = seen.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(seen.lock().unwrap().len(), count);
    }

    #[test]
    fn expired_quarter_rolls_over() {
        let mut state = DemoState {
            seq: 0,
            game: GameState {
                quarter: 2,
                clock_ms: 500,
                ..GameState::default()
            },
            rng: StdRng::seed_from_u64(1),
        };
        let tick = state.clock_tick(1000);
        assert_eq!(tick[0].kind, EventKind::ClockUpdate { clock_ms: 0 });
        let tick = state.clock_tick(1000);
        assert_eq!(
            tick[0].kind,
            EventKind::QuarterStart {
                quarter: 3,
                clock_ms: QUARTER_LENGTH_MS
            }
        );

        state.game.quarter = 4;
        state.game.clock_ms = 0;
        let tick = state.clock_tick(1000);
        assert_eq!(tick[0].type_name(), "GameStart");
        assert_eq!(tick.len(), 2);
    }
}
