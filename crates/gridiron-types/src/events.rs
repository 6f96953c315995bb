//! Normalized game events.
//!
//! Every occurrence in a game is represented as a [`NormalizedEvent`]: a
//! sequence number, a wall-clock timestamp in milliseconds, and an
//! [`EventKind`] payload. On the wire the payload is flattened next to
//! `seq` and `at` and discriminated by a `type` field:
//!
//! ```json
//! {"type": "ClockUpdate", "seq": 7, "at": 1717171717000, "clockMs": 893000}
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::state::Yardline;

/// A single sequenced, timestamped game occurrence.
///
/// Events are immutable values. `seq` is strictly increasing within one
/// source; `at` is the wall-clock time of the occurrence in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NormalizedEvent {
    /// Monotonically increasing sequence number assigned by the source.
    #[ts(type = "number")]
    pub seq: u64,
    /// Wall-clock timestamp in milliseconds.
    #[ts(type = "number")]
    pub at: i64,
    /// The occurrence itself.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl NormalizedEvent {
    /// Build an event from its parts.
    pub const fn new(seq: u64, at: i64, kind: EventKind) -> Self {
        Self { seq, at, kind }
    }

    /// The wire name of this event's variant.
    pub const fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

/// The payload of a [`NormalizedEvent`], one variant per occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type")]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// A new game begins. Resets all state.
    #[serde(rename_all = "camelCase")]
    GameStart {
        /// Identifier of the game, when the source knows one.
        #[serde(default)]
        game_id: String,
        /// Home team label.
        #[serde(default)]
        home: String,
        /// Away team label.
        #[serde(default)]
        away: String,
    },

    /// A quarter begins with the given game clock.
    #[serde(rename_all = "camelCase")]
    QuarterStart {
        /// Quarter number, starting at 1.
        quarter: u32,
        /// Game clock remaining in the quarter, in milliseconds.
        clock_ms: u32,
    },

    /// The game clock changed.
    #[serde(rename_all = "camelCase")]
    ClockUpdate {
        /// Game clock remaining in the quarter, in milliseconds.
        clock_ms: u32,
    },

    /// A play is snapped. Informational only.
    PlayStart {
        /// Current down (1-4).
        down: u8,
        /// Yards to go for a first down.
        distance: u32,
        /// Line of scrimmage.
        yardline: Yardline,
    },

    /// A play finished with the given result.
    PlayEnd {
        /// Outcome of the play.
        result: PlayResult,
    },

    /// The score changed.
    ScoreUpdate {
        /// Home team points.
        home: u32,
        /// Away team points.
        away: u32,
    },

    /// A variant this build does not know. Folding it is a no-op.
    #[serde(other)]
    Unknown,
}

impl EventKind {
    /// The wire name of this variant.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::GameStart { .. } => "GameStart",
            Self::QuarterStart { .. } => "QuarterStart",
            Self::ClockUpdate { .. } => "ClockUpdate",
            Self::PlayStart { .. } => "PlayStart",
            Self::PlayEnd { .. } => "PlayEnd",
            Self::ScoreUpdate { .. } => "ScoreUpdate",
            Self::Unknown => "Unknown",
        }
    }
}

/// The outcome carried by [`EventKind::PlayEnd`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PlayResult {
    /// Yards gained (negative for a loss). Absent on the wire means 0.
    #[serde(default)]
    pub yards: i32,
    /// Whether the play earned a first down.
    #[serde(default)]
    pub first_down: bool,
    /// Whether the play scored a touchdown, when the source reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub touchdown: Option<bool>,
}
