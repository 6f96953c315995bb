//! Viewer configuration.
//!
//! Everything is read from environment variables. The default live URL is
//! baked in at build time from `GRIDIRON_WS_URL` and can be overridden by
//! the same variable at runtime.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ClientError;

/// Live feed URL used when `GRIDIRON_WS_URL` is not set at runtime.
pub const DEFAULT_WS_URL: &str = match option_env!("GRIDIRON_WS_URL") {
    Some(url) => url,
    None => "ws://localhost:3001/ws/live",
};

/// Where the viewer's events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerMode {
    /// The broadcaster's live feed.
    Live,
    /// The local synthetic generator.
    Demo,
    /// A recorded log, every delivery scheduled up front.
    Rewind,
    /// A recorded log, delivered one event at a time with drift correction.
    Replay,
}

impl FromStr for ViewerMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "demo" => Ok(Self::Demo),
            "rewind" => Ok(Self::Rewind),
            "replay" => Ok(Self::Replay),
            other => Err(ClientError::Config(format!(
                "unknown GRIDIRON_MODE {other:?} (expected live, demo, rewind or replay)"
            ))),
        }
    }
}

/// Complete viewer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Event source.
    pub mode: ViewerMode,
    /// Live feed URL.
    pub ws_url: String,
    /// Event log for `rewind` and `replay` modes.
    pub replay_file: Option<PathBuf>,
    /// Playback speed factor (clamped by the playback sources).
    pub replay_speed: f64,
    /// Directory to write an export of every received event on shutdown.
    pub record_dir: Option<PathBuf>,
}

impl ViewerConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional variables:
    /// - `GRIDIRON_MODE` -- `live`, `demo`, `rewind` or `replay` (default `demo`)
    /// - `GRIDIRON_WS_URL` -- live feed URL (default [`DEFAULT_WS_URL`])
    /// - `GRIDIRON_REPLAY_FILE` -- event log, required for `rewind` and `replay`
    /// - `GRIDIRON_REPLAY_SPEED` -- playback speed factor (default 1.0)
    /// - `GRIDIRON_RECORD_FILE` -- directory for the export written on shutdown
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode: ViewerMode = lookup("GRIDIRON_MODE")
            .unwrap_or_else(|| "demo".to_owned())
            .parse()?;

        let ws_url = lookup("GRIDIRON_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_owned());

        let replay_file = lookup("GRIDIRON_REPLAY_FILE").map(PathBuf::from);

        let replay_speed: f64 = lookup("GRIDIRON_REPLAY_SPEED")
            .unwrap_or_else(|| "1.0".to_owned())
            .parse()
            .map_err(|e| ClientError::Config(format!("invalid GRIDIRON_REPLAY_SPEED: {e}")))?;

        let record_dir = lookup("GRIDIRON_RECORD_FILE").map(PathBuf::from);

        if matches!(mode, ViewerMode::Rewind | ViewerMode::Replay) && replay_file.is_none() {
            return Err(ClientError::Config(
                "GRIDIRON_REPLAY_FILE is required for rewind and replay modes".to_owned(),
            ));
        }

        Ok(Self {
            mode,
            ws_url,
            replay_file,
            replay_speed,
            record_dir,
        })
    }
}
