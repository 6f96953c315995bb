//! The folded game-state snapshot consumed by renderers.
//!
//! A [`GameState`] is produced by folding [`NormalizedEvent`]s through the
//! reducer in `gridiron-core`. These types derive [`TS`] so the renderer
//! can import matching `TypeScript` definitions from `bindings/`.
//!
//! [`NormalizedEvent`]: crate::events::NormalizedEvent

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Length of a quarter in milliseconds (15 minutes).
pub const QUARTER_LENGTH_MS: u32 = 15 * 60 * 1000;

/// Yards needed for a fresh set of downs.
pub const FIRST_DOWN_DISTANCE: u32 = 10;

/// Yard line where a drive starts by default.
pub const DEFAULT_START_YARDS: u8 = 25;

/// Which half of the field a yard line refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// The possessing team's own half.
    Own,
    /// The opponent's half.
    Opp,
    /// Midfield.
    Mid,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Own => "OWN",
            Self::Opp => "OPP",
            Self::Mid => "MID",
        })
    }
}

/// Field position as a side and a yard count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Yardline {
    /// Half of the field.
    pub side: Side,
    /// Yards, in `[0, 100]`.
    pub yards: u8,
}

impl Default for Yardline {
    fn default() -> Self {
        Self {
            side: Side::Own,
            yards: DEFAULT_START_YARDS,
        }
    }
}

/// Points for each team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Score {
    /// Home team points.
    pub home: u32,
    /// Away team points.
    pub away: u32,
}

/// Identity of the game being followed, taken from `GameStart`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GameInfo {
    /// Source-assigned game identifier.
    pub id: String,
    /// Home team label.
    pub home: String,
    /// Away team label.
    pub away: String,
}

/// The authoritative snapshot of a game in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Current quarter, starting at 1.
    pub quarter: u32,
    /// Game clock remaining in the quarter, in milliseconds.
    pub clock_ms: u32,
    /// Current down (1-4).
    pub down: u8,
    /// Yards to go for a first down.
    pub distance: u32,
    /// Line of scrimmage.
    pub yardline: Yardline,
    /// Current score.
    pub score: Score,
    /// Game identity, once a `GameStart` has been seen.
    #[serde(default)]
    pub game: Option<GameInfo>,
}

impl Default for GameState {
    /// Kickoff state: Q1 15:00, 1st & 10 on the OWN 25, 0-0.
    fn default() -> Self {
        Self {
            quarter: 1,
            clock_ms: QUARTER_LENGTH_MS,
            down: 1,
            distance: FIRST_DOWN_DISTANCE,
            yardline: Yardline::default(),
            score: Score::default(),
            game: None,
        }
    }
}
