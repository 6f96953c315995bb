//! Text rendering of the scoreboard.
//!
//! The graphical renderer is external; the viewer binary uses
//! [`LogRenderer`] to print the same scoreboard segments through `tracing`.

use std::fmt;

use gridiron_types::{GameState, NormalizedEvent};
use tracing::{debug, info};

use crate::connection::ConnectionStatus;

/// Receives folded snapshots from a viewer session.
pub trait Renderer: Send + Sync {
    /// Called once per delivered batch with the state after folding it.
    fn render(&self, state: &GameState, batch: &[NormalizedEvent]);

    /// Called on live connection status changes.
    fn status(&self, _status: ConnectionStatus) {}
}

/// One scoreboard line: down and distance, spot, clock, score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HudLine<'a> {
    state: &'a GameState,
}

impl<'a> HudLine<'a> {
    /// Format `state`.
    pub const fn new(state: &'a GameState) -> Self {
        Self { state }
    }
}

impl fmt::Display for HudLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state;
        write!(
            f,
            "{}&{} {}{} | Q{} {} | {}-{}",
            s.down,
            s.distance,
            s.yardline.side,
            s.yardline.yards,
            s.quarter,
            GameClock(s.clock_ms),
            s.score.home,
            s.score.away,
        )
    }
}

/// Game clock as `m:ss`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameClock(pub u32);

impl fmt::Display for GameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.0 / 60_000;
        let seconds = (self.0 % 60_000) / 1000;
        write!(f, "{minutes}:{seconds:02}")
    }
}

/// Renderer that logs each snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn render(&self, state: &GameState, batch: &[NormalizedEvent]) {
        for event in batch {
            debug!(seq = event.seq, event_type = event.type_name(), "event");
        }
        info!(target: "gridiron::hud", "{}", HudLine::new(state));
    }

    fn status(&self, status: ConnectionStatus) {
        info!(%status, "connection status");
    }
}
