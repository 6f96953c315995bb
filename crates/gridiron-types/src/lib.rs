//! Shared type definitions for the Gridiron live feed.
//!
//! This crate is the single source of truth for everything that crosses a
//! boundary: the events sources emit, the snapshot renderers draw, and the
//! frames exchanged on `/ws/live`. State types flow downstream to
//! `TypeScript` via `ts-rs` for the renderer.
//!
//! # Modules
//!
//! - [`events`] -- [`NormalizedEvent`] and its [`EventKind`] payloads
//! - [`state`] -- [`GameState`] snapshot and its components
//! - [`wire`] -- Frame encoding/decoding and heartbeat control messages
//! - [`ids`] -- Connection identifiers used by the broadcaster

pub mod events;
pub mod ids;
pub mod state;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use events::{EventKind, NormalizedEvent, PlayResult};
pub use ids::ConnectionId;
pub use state::{
    DEFAULT_START_YARDS, FIRST_DOWN_DISTANCE, GameInfo, GameState, QUARTER_LENGTH_MS, Score, Side,
    Yardline,
};
pub use wire::{
    ControlMessage, FrameError, ServerFrame, decode_client_frame, decode_server_frame,
    encode_control, encode_events,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the renderer.

    #[test]
    fn export_bindings() {
        // The files are written to the `bindings/` directory relative to
        // the crate root.
        use ts_rs::TS;

        let _ = crate::ids::ConnectionId::export_all();
        let _ = crate::state::Side::export_all();
        let _ = crate::state::Yardline::export_all();
        let _ = crate::state::Score::export_all();
        let _ = crate::state::GameInfo::export_all();
        let _ = crate::state::GameState::export_all();
        let _ = crate::events::PlayResult::export_all();
        let _ = crate::events::EventKind::export_all();
        let _ = crate::events::NormalizedEvent::export_all();
    }

    #[test]
    fn event_bindings_match_the_wire() {
        use ts_rs::TS;

        let result = crate::events::PlayResult::decl();
        assert!(result.contains("firstDown: boolean"), "{result}");
        assert!(result.contains("touchdown?: boolean"), "{result}");

        let kind = crate::events::EventKind::decl();
        assert!(kind.contains("\"ClockUpdate\""), "{kind}");
        assert!(kind.contains("clockMs: number"), "{kind}");

        let event = crate::events::NormalizedEvent::decl();
        assert!(event.contains("seq: number"), "{event}");
        assert!(event.contains("at: number"), "{event}");
    }
}
