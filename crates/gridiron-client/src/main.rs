//! Headless Gridiron viewer.
//!
//! Follows the live feed, the demo generator or a recorded log, and logs
//! the scoreboard after every batch. On Ctrl-C the source is stopped and,
//! if `GRIDIRON_RECORD_FILE` names a directory, everything received is
//! exported there.

use std::sync::Arc;

use gridiron_client::{LogRenderer, ViewerConfig, ViewerSession};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the replay log cannot
/// be read, or the export cannot be written.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("gridiron-viewer starting");

    let config = ViewerConfig::from_env()?;
    info!(
        mode = ?config.mode,
        ws_url = config.ws_url,
        replay_speed = config.replay_speed,
        recording = config.record_dir.is_some(),
        "configuration loaded"
    );

    let mut session = ViewerSession::new(Arc::new(LogRenderer), config.record_dir.is_some());
    session.start(&config)?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    session.stop();
    if let Some(dir) = &config.record_dir {
        session.export(dir)?;
    }
    session.shutdown();

    info!("gridiron-viewer stopped");
    Ok(())
}
