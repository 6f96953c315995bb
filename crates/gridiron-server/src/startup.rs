//! Background tasks that run alongside the HTTP server.
//!
//! [`BackgroundTasks::spawn`] starts the heartbeat sweep and, when enabled,
//! the demo ticker that feeds every viewer. Both stop when the returned
//! value is stopped or dropped.

use std::sync::Arc;

use gridiron_core::{DemoSource, EventSink, Timers};
use tracing::info;

use crate::broadcaster::spawn_heartbeat;
use crate::config::ServerConfig;
use crate::state::AppState;

/// Handles to the server's background tasks.
#[derive(Debug)]
pub struct BackgroundTasks {
    heartbeat: Timers,
    demo: Option<DemoSource>,
}

impl BackgroundTasks {
    /// Start the heartbeat and demo ticker. Must be called from within a
    /// Tokio runtime.
    pub fn spawn(state: &AppState, config: &ServerConfig) -> Self {
        let broadcaster = Arc::clone(state.broadcaster());

        let heartbeat = Timers::new();
        spawn_heartbeat(
            Arc::clone(&broadcaster),
            config.heartbeat_interval(),
            &heartbeat,
        );
        info!(
            interval_ms = config.heartbeat_interval_ms,
            "heartbeat started"
        );

        let demo = config.demo.enabled.then(|| {
            let sink: Arc<dyn EventSink> = broadcaster;
            let demo = DemoSource::with_config(sink, config.demo.demo_config());
            demo.start();
            demo
        });

        Self { heartbeat, demo }
    }

    /// Whether the demo ticker is running.
    pub const fn demo_running(&self) -> bool {
        self.demo.is_some()
    }

    /// Stop everything.
    pub fn stop(&mut self) {
        self.heartbeat.cancel_all();
        if let Some(demo) = self.demo.take() {
            demo.stop();
        }
        info!("background tasks stopped");
    }
}
