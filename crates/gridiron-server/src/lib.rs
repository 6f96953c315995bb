//! Live feed broadcaster for Gridiron.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/live`) pushing every broadcast event
//!   batch and a heartbeat `Ping` to each connected viewer
//! - **`GET /health`** liveness probe
//! - **`GET /api/state`** with the game folded from everything broadcast
//!   so far and the number of connected viewers
//!
//! # Architecture
//!
//! The [`Broadcaster`] is the single registry of viewer sockets. The demo
//! ticker pushes into it through the [`EventSink`] trait; every batch is
//! folded into the server's own snapshot and then fanned out to all peers
//! without waiting on any of them. A periodic heartbeat sweep terminates
//! sockets that stopped answering.
//!
//! [`EventSink`]: gridiron_core::EventSink

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use broadcaster::{Broadcaster, HeartbeatReport};
pub use config::{ConfigError, DemoTickerConfig, ServerConfig};
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, bind, serve, start_server};
pub use startup::BackgroundTasks;
pub use state::AppState;
