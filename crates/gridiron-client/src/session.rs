//! A viewer session: one event source feeding one buffer and one game.
//!
//! The session owns the [`EventBuffer`] every source pushes into and the
//! [`GameSession`] its batches are folded into. Each delivered batch is
//! folded, handed to the [`Renderer`], and optionally recorded for export.
//! Only one source runs at a time; starting another stops the current one
//! and begins a fresh game.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use gridiron_core::{
    DemoConfig, DemoSource, EventBuffer, EventSink, GameSession, PlaybackScheduler, RewindSource,
    SourceHandle, export_file_name, read_event_log, write_event_log,
};
use gridiron_types::{GameState, NormalizedEvent};
use tracing::{debug, info};

use crate::config::{ViewerConfig, ViewerMode};
use crate::connection::{ConnectionManager, LiveConnection};
use crate::error::ClientError;
use crate::hud::Renderer;

/// Label used for exported event logs.
const EXPORT_LABEL: &str = "gridiron";

type Recording = Arc<Mutex<Vec<NormalizedEvent>>>;

enum ActiveSource {
    Live(LiveConnection),
    Demo(DemoSource),
    Rewind(SourceHandle),
    Replay(PlaybackScheduler),
}

impl ActiveSource {
    fn stop(&self) {
        match self {
            Self::Live(connection) => connection.close(),
            Self::Demo(demo) => demo.stop(),
            Self::Rewind(handle) => handle.close(),
            Self::Replay(scheduler) => scheduler.stop(),
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Live(_) => "live",
            Self::Demo(_) => "demo",
            Self::Rewind(_) => "rewind",
            Self::Replay(_) => "replay",
        }
    }
}

/// Source, buffer and folded game for one viewer.
pub struct ViewerSession {
    buffer: Arc<EventBuffer>,
    game: Arc<GameSession>,
    renderer: Arc<dyn Renderer>,
    recording: Option<Recording>,
    source: Option<ActiveSource>,
}

impl ViewerSession {
    /// Create an idle session. When `record` is set, every folded event is
    /// kept for [`ViewerSession::export`].
    pub fn new(renderer: Arc<dyn Renderer>, record: bool) -> Self {
        let buffer = Arc::new(EventBuffer::new());
        let game = Arc::new(GameSession::new());
        let recording: Option<Recording> = record.then(|| Arc::new(Mutex::new(Vec::new())));

        let fold_into = Arc::clone(&game);
        let render_to = Arc::clone(&renderer);
        buffer.subscribe(move |batch| {
            if let Some(state) = fold_into.apply_batch(batch) {
                render_to.render(&state, batch);
            }
        });

        if let Some(recording) = &recording {
            let record_into = Arc::clone(recording);
            buffer.subscribe(move |batch| lock(&record_into).extend_from_slice(batch));
        }

        Self {
            buffer,
            game,
            renderer,
            recording,
            source: None,
        }
    }

    /// The buffer sources push into.
    pub const fn buffer(&self) -> &Arc<EventBuffer> {
        &self.buffer
    }

    /// The current folded state, if any event has been seen.
    pub fn snapshot(&self) -> Option<GameState> {
        self.game.snapshot()
    }

    /// Name of the running source, if any.
    pub fn source_name(&self) -> Option<&'static str> {
        self.source.as_ref().map(ActiveSource::name)
    }

    /// Events recorded so far, or `None` when not recording.
    pub fn recorded(&self) -> Option<Vec<NormalizedEvent>> {
        self.recording.as_ref().map(|r| lock(r).clone())
    }

    /// Start the source selected by `config`.
    ///
    /// Rewind and replay modes read their event log here.
    pub fn start(&mut self, config: &ViewerConfig) -> Result<(), ClientError> {
        match config.mode {
            ViewerMode::Live => self.start_live(ConnectionManager::new(config.ws_url.clone())),
            ViewerMode::Demo => self.start_demo(DemoConfig::default()),
            ViewerMode::Rewind => {
                let events = read_log(config.replay_file.as_deref())?;
                self.start_rewind(events, config.replay_speed);
            }
            ViewerMode::Replay => {
                let events = read_log(config.replay_file.as_deref())?;
                self.start_replay(events, config.replay_speed);
            }
        }
        Ok(())
    }

    /// Follow the live feed.
    pub fn start_live(&mut self, manager: ConnectionManager) {
        self.reset();
        let renderer = Arc::clone(&self.renderer);
        let connection = manager.connect(move |status| renderer.status(status));
        let buffer = Arc::clone(&self.buffer);
        connection.subscribe(move |batch| buffer.push_many(batch.to_vec()));
        self.install(ActiveSource::Live(connection));
    }

    /// Run the synthetic generator.
    pub fn start_demo(&mut self, config: DemoConfig) {
        self.reset();
        let sink: Arc<dyn EventSink> = self.buffer.clone();
        let demo = DemoSource::with_config(sink, config);
        demo.start();
        self.install(ActiveSource::Demo(demo));
    }

    /// Replay a recorded log with every delivery scheduled up front.
    pub fn start_rewind(&mut self, events: Vec<NormalizedEvent>, speed: f64) {
        self.reset();
        let sink: Arc<dyn EventSink> = self.buffer.clone();
        let handle = RewindSource::new(events, speed).start(sink);
        self.install(ActiveSource::Rewind(handle));
    }

    /// Replay a recorded log one event at a time.
    pub fn start_replay(&mut self, events: Vec<NormalizedEvent>, speed: f64) {
        self.reset();
        let scheduler = PlaybackScheduler::with_speed(events, speed);
        let buffer = Arc::clone(&self.buffer);
        scheduler.subscribe(move |event| buffer.push_many(vec![event.clone()]));
        scheduler.start();
        self.install(ActiveSource::Replay(scheduler));
    }

    /// Stop the running source. The folded state is kept.
    pub fn stop(&mut self) {
        if let Some(source) = self.source.take() {
            source.stop();
            info!(source = source.name(), "source stopped");
        }
    }

    /// Write the recorded events to `dir` and return the file path.
    ///
    /// Returns `Ok(None)` when the session is not recording.
    pub fn export(&self, dir: &Path) -> Result<Option<PathBuf>, ClientError> {
        let Some(events) = self.recorded() else {
            return Ok(None);
        };
        let path = dir.join(export_file_name(EXPORT_LABEL, Utc::now()));
        write_event_log(&path, &events)?;
        info!(path = %path.display(), count = events.len(), "event log exported");
        Ok(Some(path))
    }

    /// Stop the source and release the buffer and game.
    pub fn shutdown(&mut self) {
        self.stop();
        self.buffer.dispose();
        self.game.end();
        debug!("viewer session shut down");
    }

    fn reset(&mut self) {
        self.stop();
        self.buffer.clear();
        self.game.end();
    }

    fn install(&mut self, source: ActiveSource) {
        info!(source = source.name(), "source started");
        self.source = Some(source);
    }
}

impl std::fmt::Debug for ViewerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerSession")
            .field("source", &self.source_name())
            .field("recording", &self.recording.is_some())
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

fn read_log(path: Option<&Path>) -> Result<Vec<NormalizedEvent>, ClientError> {
    let path = path.ok_or_else(|| ClientError::Config("no replay file configured".to_owned()))?;
    let events = read_event_log(path)?;
    info!(path = %path.display(), count = events.len(), "event log loaded");
    Ok(events)
}

fn lock(recording: &Recording) -> MutexGuard<'_, Vec<NormalizedEvent>> {
    recording.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gridiron_core::fold;
    use gridiron_types::{EventKind, PlayResult, Yardline};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingRenderer {
        renders: Mutex<Vec<GameState>>,
    }

    impl Renderer for CountingRenderer {
        fn render(&self, state: &GameState, _batch: &[NormalizedEvent]) {
            self.renders.lock().unwrap().push(state.clone());
        }
    }

    fn recorded_log() -> Vec<NormalizedEvent> {
        vec![
            NormalizedEvent::new(
                1,
                1000,
                EventKind::QuarterStart {
                    quarter: 1,
                    clock_ms: 900_000,
                },
            ),
            NormalizedEvent::new(
                2,
                1500,
                EventKind::PlayStart {
                    down: 1,
                    distance: 10,
                    yardline: Yardline::default(),
                },
            ),
            NormalizedEvent::new(
                3,
                2000,
                EventKind::PlayEnd {
                    result: PlayResult {
                        yards: 12,
                        first_down: true,
                        touchdown: None,
                    },
                },
            ),
            NormalizedEvent::new(4, 3000, EventKind::ClockUpdate { clock_ms: 880_000 }),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn demo_session_folds_and_records() {
        let renderer = Arc::new(CountingRenderer::default());
        let mut session = ViewerSession::new(renderer.clone(), true);
        session.start_demo(DemoConfig {
            seed: Some(3),
            ..DemoConfig::default()
        });
        assert_eq!(session.source_name(), Some("demo"));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let state = session.snapshot().unwrap();
        assert_eq!(state.clock_ms, 899_000);
        assert!(state.game.is_some());

        let recorded = session.recorded().unwrap();
        assert_eq!(recorded.len(), 3);
        // Kickoff arrives as one batch, then one clock tick.
        assert_eq!(renderer.renders.lock().unwrap().len(), 2);
        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn rewind_session_matches_direct_fold() {
        let renderer = Arc::new(CountingRenderer::default());
        let mut session = ViewerSession::new(renderer, false);
        session.start_rewind(recorded_log(), 2.0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let expected = fold(None, &recorded_log()).unwrap();
        assert_eq!(session.snapshot().unwrap(), expected);
        assert_eq!(expected.yardline.yards, 37);
        assert!(session.recorded().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn replay_session_delivers_in_order() {
        let renderer = Arc::new(CountingRenderer::default());
        let mut session = ViewerSession::new(renderer, true);
        let mut shuffled = recorded_log();
        shuffled.reverse();
        session.start_replay(shuffled, 1.0);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        let seqs: Vec<u64> = session.recorded().unwrap().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_halts_delivery() {
        let renderer = Arc::new(CountingRenderer::default());
        let mut session = ViewerSession::new(renderer.clone(), false);
        session.start_rewind(recorded_log(), 1.0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        session.stop();
        let seen = renderer.renders.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(renderer.renders.lock().unwrap().len(), seen);
        assert_eq!(session.source_name(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_sources_starts_a_fresh_game() {
        let renderer = Arc::new(CountingRenderer::default());
        let mut session = ViewerSession::new(renderer, false);
        session.start_rewind(recorded_log(), 1.0);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(session.snapshot().unwrap().yardline.yards, 37);

        session.start_rewind(Vec::new(), 1.0);
        assert_eq!(session.snapshot(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn export_writes_recorded_events() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(CountingRenderer::default());
        let mut session = ViewerSession::new(renderer, true);
        session.start_rewind(recorded_log(), 1.0);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let path = session.export(dir.path()).unwrap().unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("gridiron_"));
        assert_eq!(read_event_log(&path).unwrap(), recorded_log());
    }

    #[test]
    fn export_without_recording_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let session = ViewerSession::new(Arc::new(CountingRenderer::default()), false);
        assert!(session.export(dir.path()).unwrap().is_none());
    }
}
