//! Event distribution and deterministic replay for the Gridiron live feed.
//!
//! Sources push batches of events into an [`EventBuffer`]; subscribers
//! receive each flushed batch in arrival order and fold it with
//! [`apply_event`] into the session's single [`GameState`] snapshot.
//!
//! # Modules
//!
//! - [`reducer`] -- Pure [`apply_event`] fold and the per-session
//!   [`GameSession`] holder.
//! - [`subscribers`] -- Token-keyed handler registry with snapshot dispatch.
//! - [`timer`] -- Cancellable timer set driving every time-based source.
//! - [`buffer`] -- [`EventBuffer`] and the [`EventSink`] trait.
//! - [`playback`] -- [`PlaybackScheduler`] and [`RewindSource`].
//! - [`demo`] -- [`DemoSource`] synthetic generator.
//! - [`event_log`] -- JSON event-log import and export.
//!
//! [`GameState`]: gridiron_types::GameState

pub mod buffer;
pub mod demo;
pub mod event_log;
pub mod playback;
pub mod reducer;
pub mod subscribers;
pub mod timer;

pub use buffer::{EventBuffer, EventSink};
pub use demo::{DemoConfig, DemoSource};
pub use event_log::{EventLogError, export_file_name, read_event_log, write_event_log};
pub use playback::{MIN_SPEED, PlaybackScheduler, RewindSource, SourceHandle};
pub use reducer::{GameSession, apply_event, fold};
pub use subscribers::{SubscriberRegistry, SubscriptionId};
pub use timer::{TimerGuard, Timers};
