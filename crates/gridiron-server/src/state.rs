//! Shared application state for the broadcaster's routes.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::broadcaster::Broadcaster;

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    broadcaster: Arc<Broadcaster>,
    started_at: DateTime<Utc>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Create state with an empty broadcaster.
    pub fn new() -> Self {
        Self::with_broadcaster(Arc::new(Broadcaster::new()))
    }

    /// Create state around an existing broadcaster.
    pub fn with_broadcaster(broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            broadcaster,
            started_at: Utc::now(),
        }
    }

    /// The live-feed broadcaster.
    pub const fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// When the server started.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
