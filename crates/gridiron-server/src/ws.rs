//! `WebSocket` handler for the live feed.
//!
//! Clients connect to `GET /ws/live`. Each socket is registered with the
//! [`Broadcaster`](crate::broadcaster::Broadcaster) and receives every
//! broadcast frame and heartbeat `Ping`. The only frame a client sends is
//! `Pong`, which keeps it alive across heartbeat sweeps.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use gridiron_types::{ControlMessage, decode_client_frame};
use tracing::debug;

use crate::state::AppState;

/// Upgrade an HTTP request to a live-feed socket.
///
/// # Route
///
/// `GET /ws/live`
pub async fn ws_live(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Forward broadcast frames to the socket and watch it for `Pong` and close.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let broadcaster = Arc::clone(state.broadcaster());
    let (id, mut rx) = broadcaster.register();

    loop {
        tokio::select! {
            frame = rx.recv() => {
                if let Some(text) = frame {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        debug!(connection_id = %id, "send failed, dropping viewer");
                        break;
                    }
                } else {
                    // Removed by the heartbeat sweep or shutdown.
                    debug!(connection_id = %id, "viewer terminated");
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match decode_client_frame(text.as_str()) {
                        Ok(ControlMessage::Pong { .. }) => {
                            broadcaster.mark_alive(id);
                        }
                        Ok(other) => debug!(connection_id = %id, ?other, "ignoring control frame"),
                        Err(e) => debug!(connection_id = %id, error = %e, "dropping malformed frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(connection_id = %id, error = %e, "socket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    broadcaster.unregister(id);
}
