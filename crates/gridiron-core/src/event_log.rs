//! Reading and writing recorded event logs.
//!
//! An event log is a JSON array of [`NormalizedEvent`] records. Logs are
//! only ever supplied by the caller (for rewind playback) or exported by a
//! viewer from what it received itself.

use std::path::Path;

use chrono::{DateTime, Utc};
use gridiron_types::NormalizedEvent;

/// Errors that can occur while reading or writing an event log.
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    /// The file could not be read or written.
    #[error("event log I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The file was not a JSON array of events.
    #[error("event log JSON error: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// Parse an event log from a JSON string.
///
/// # Errors
///
/// Returns [`EventLogError::Json`] if the text is not an array of events.
pub fn parse_event_log(json: &str) -> Result<Vec<NormalizedEvent>, EventLogError> {
    Ok(serde_json::from_str(json)?)
}

/// Read an event log from disk.
///
/// # Errors
///
/// Returns [`EventLogError::Io`] if the file cannot be read, or
/// [`EventLogError::Json`] if it is not an array of events.
pub fn read_event_log(path: &Path) -> Result<Vec<NormalizedEvent>, EventLogError> {
    let contents = std::fs::read_to_string(path)?;
    parse_event_log(&contents)
}

/// Write events to disk as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`EventLogError`] if serialization or the write fails.
pub fn write_event_log(path: &Path, events: &[NormalizedEvent]) -> Result<(), EventLogError> {
    let json = serde_json::to_string_pretty(events)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// File name for an export taken at `now`: `<label>_<YYYY-MM-DDTHH-MM-SS>.json`.
pub fn export_file_name(label: &str, now: DateTime<Utc>) -> String {
    format!("{label}_{}.json", now.format("%Y-%m-%dT%H-%M-%S"))
}
