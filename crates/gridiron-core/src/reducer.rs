//! Pure state reducer.
//!
//! [`apply_event`] folds one [`NormalizedEvent`] into a prior [`GameState`].
//! It reads no clocks and performs no I/O, so folding the same ordered
//! sequence from the same starting state always yields the same result.
//!
//! [`GameSession`] owns the single live snapshot of a session and is what
//! sources' subscribers feed.

use std::sync::{Mutex, MutexGuard, PoisonError};

use gridiron_types::{
    EventKind, FIRST_DOWN_DISTANCE, GameInfo, GameState, NormalizedEvent, PlayResult, Score,
};

/// Lowest yard line a play can end on.
const MIN_SPOT: i64 = 1;

/// Highest yard line a play can end on.
const MAX_SPOT: i64 = 99;

/// Highest down tracked. Turnover on downs is not modelled.
const MAX_DOWN: u8 = 4;

/// Fold one event into the prior state.
///
/// A `None` prior is treated as [`GameState::default`]. `GameStart`
/// discards the prior entirely; `PlayStart` and unknown variants return it
/// unchanged.
pub fn apply_event(prior: Option<&GameState>, event: &NormalizedEvent) -> GameState {
    let base = || prior.cloned().unwrap_or_default();

    match &event.kind {
        EventKind::GameStart {
            game_id,
            home,
            away,
        } => GameState {
            game: Some(GameInfo {
                id: game_id.clone(),
                home: home.clone(),
                away: away.clone(),
            }),
            ..GameState::default()
        },
        EventKind::QuarterStart { quarter, clock_ms } => GameState {
            quarter: *quarter,
            clock_ms: *clock_ms,
            ..base()
        },
        EventKind::ClockUpdate { clock_ms } => GameState {
            clock_ms: *clock_ms,
            ..base()
        },
        EventKind::ScoreUpdate { home, away } => GameState {
            score: Score {
                home: *home,
                away: *away,
            },
            ..base()
        },
        EventKind::PlayEnd { result } => advance_play(base(), result),
        EventKind::PlayStart { .. } | EventKind::Unknown => base(),
    }
}

/// Fold a sequence of events starting from `initial`.
///
/// Returns `initial` untouched when `events` is empty.
pub fn fold<'a, I>(initial: Option<GameState>, events: I) -> Option<GameState>
where
    I: IntoIterator<Item = &'a NormalizedEvent>,
{
    events
        .into_iter()
        .fold(initial, |state, event| Some(apply_event(state.as_ref(), event)))
}

/// Move the ball and update down/distance after a completed play.
fn advance_play(mut state: GameState, result: &PlayResult) -> GameState {
    let gain = i64::from(result.yards);

    let spot = i64::from(state.yardline.yards)
        .saturating_add(gain)
        .clamp(MIN_SPOT, MAX_SPOT);
    state.yardline.yards = u8::try_from(spot).unwrap_or(u8::MAX);

    let remaining = i64::from(state.distance).saturating_sub(gain);
    if result.first_down || remaining <= 0 {
        state.down = 1;
        state.distance = FIRST_DOWN_DISTANCE;
    } else {
        state.down = state.down.saturating_add(1).min(MAX_DOWN);
        state.distance = u32::try_from(remaining.max(1)).unwrap_or(u32::MAX);
    }

    state
}

/// The single live [`GameState`] of one viewing session.
///
/// The snapshot is created by the first folded event (normally
/// `GameStart`), replaced on every later event, and discarded by
/// [`GameSession::end`].
#[derive(Debug, Default)]
pub struct GameSession {
    state: Mutex<Option<GameState>>,
}

impl GameSession {
    /// Create a session with no snapshot yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a batch into the session and return the resulting snapshot.
    pub fn apply_batch(&self, events: &[NormalizedEvent]) -> Option<GameState> {
        let mut guard = self.lock();
        *guard = fold(guard.take(), events);
        guard.clone()
    }

    /// A copy of the current snapshot, if any event has been folded.
    pub fn snapshot(&self) -> Option<GameState> {
        self.lock().clone()
    }

    /// Discard the snapshot. The next folded event starts a new one.
    pub fn end(&self) {
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<GameState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
