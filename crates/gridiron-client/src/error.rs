//! Error types for the viewer.
//!
//! Transport failures never surface here: the connection manager turns them
//! into status transitions. Only setup paths (configuration, event-log
//! files) are fallible.

use gridiron_core::EventLogError;

/// Errors that can occur while setting up or shutting down a viewer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// An event log could not be read or written.
    #[error(transparent)]
    EventLog(#[from] EventLogError),
}
