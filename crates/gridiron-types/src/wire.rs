//! Frame codec for the `/ws/live` socket.
//!
//! Server-to-client text frames carry either a single event object, a JSON
//! array of events, or a `Ping` control message. Client-to-server frames
//! carry `Pong` replies. All decoding happens here so that nothing past the
//! transport boundary ever sees untyped JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::events::{EventKind, NormalizedEvent};

/// Errors produced while decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame was not valid JSON, or did not match the expected schema.
    #[error("invalid frame JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame was valid JSON of the wrong shape.
    #[error("unexpected frame shape: {0}")]
    Shape(&'static str),
}

/// Heartbeat control messages exchanged on the live socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Liveness probe sent by the server.
    Ping {
        /// Sender timestamp in milliseconds.
        ts: i64,
    },
    /// Reply to a [`ControlMessage::Ping`], echoing its timestamp.
    Pong {
        /// Timestamp copied from the ping.
        ts: i64,
    },
}

/// A decoded server-to-client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    /// A heartbeat probe that must be answered with a `Pong`.
    Ping {
        /// Timestamp to echo back.
        ts: i64,
    },
    /// One or more events, in wire order.
    Events(Vec<NormalizedEvent>),
}

/// Decode a text frame received from the broadcaster.
///
/// Unrecognized event variants decode to [`EventKind::Unknown`] and are
/// logged here; the reducer treats them as no-ops.
///
/// # Errors
///
/// Returns [`FrameError`] when the frame is not JSON, is not an object or
/// array, or any contained event fails to decode. A malformed array is
/// rejected as a whole.
pub fn decode_server_frame(text: &str) -> Result<ServerFrame, FrameError> {
    let value: Value = serde_json::from_str(text)?;
    let events = match value {
        Value::Array(_) => serde_json::from_value::<Vec<NormalizedEvent>>(value)?,
        Value::Object(ref map) => {
            if map.get("type").and_then(Value::as_str) == Some("Ping") {
                return match serde_json::from_value(value)? {
                    ControlMessage::Ping { ts } => Ok(ServerFrame::Ping { ts }),
                    ControlMessage::Pong { .. } => Err(FrameError::Shape("pong sent by server")),
                };
            }
            vec![serde_json::from_value::<NormalizedEvent>(value)?]
        }
        _ => return Err(FrameError::Shape("expected event object or array")),
    };

    for event in &events {
        if event.kind == EventKind::Unknown {
            debug!(seq = event.seq, "unrecognized event variant, forwarding as no-op");
        }
    }

    Ok(ServerFrame::Events(events))
}

/// Decode a text frame received from a client.
///
/// # Errors
///
/// Returns [`FrameError::Json`] if the frame is not a control message.
pub fn decode_client_frame(text: &str) -> Result<ControlMessage, FrameError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode a batch of events as a text frame.
///
/// A single event is sent as a bare object; anything else as an array.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if serialization fails.
pub fn encode_events(events: &[NormalizedEvent]) -> Result<String, serde_json::Error> {
    match events {
        [single] => serde_json::to_string(single),
        many => serde_json::to_string(many),
    }
}

/// Encode a control message as a text frame.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if serialization fails.
pub fn encode_control(message: &ControlMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}
