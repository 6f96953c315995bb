//! Gridiron broadcaster entry point.
//!
//! Loads configuration, starts the heartbeat and demo ticker, and serves
//! `/ws/live`, `/health` and `/api/state` until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use gridiron_server::config::DEFAULT_CONFIG_FILE;
use gridiron_server::{AppState, BackgroundTasks, ServerConfig, start_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the server cannot bind.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("gridiron-server starting");

    let config_path = std::env::var("GRIDIRON_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
    let config = ServerConfig::load(&config_path)?;
    info!(
        config_path = %config_path.display(),
        host = config.host,
        port = config.port,
        heartbeat_interval_ms = config.heartbeat_interval_ms,
        demo_enabled = config.demo.enabled,
        "configuration loaded"
    );

    let state = Arc::new(AppState::new());
    let mut tasks = BackgroundTasks::spawn(&state, &config);

    let result = start_server(&config, state).await;
    tasks.stop();
    result?;

    info!("gridiron-server stopped");
    Ok(())
}
