//! Client side of the Gridiron live feed.
//!
//! Connects to the broadcaster (or runs a local demo or recorded log),
//! pushes everything through an event buffer, and folds it into a single
//! game snapshot for the renderer.
//!
//! # Modules
//!
//! - [`backoff`] -- Reconnect delay schedule.
//! - [`connection`] -- [`ConnectionManager`] and the caller-owned
//!   [`LiveConnection`] handle.
//! - [`config`] -- [`ViewerConfig`] loaded from the environment.
//! - [`hud`] -- [`Renderer`] trait and the text scoreboard.
//! - [`session`] -- [`ViewerSession`] wiring a source to the buffer and game.
//! - [`error`] -- [`ClientError`].

pub mod backoff;
pub mod config;
pub mod connection;
pub mod error;
pub mod hud;
pub mod session;

pub use backoff::Backoff;
pub use config::{DEFAULT_WS_URL, ViewerConfig, ViewerMode};
pub use connection::{ConnectionManager, ConnectionStatus, LiveConnection};
pub use error::ClientError;
pub use hud::{GameClock, HudLine, LogRenderer, Renderer};
pub use session::ViewerSession;
