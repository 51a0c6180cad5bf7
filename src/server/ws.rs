//! Screencast WebSocket endpoint.
//!
//! Broadcasts `{type: "screencast_frame", session_id, frame, timestamp}` to
//! every subscriber. A client may ask for `get_current_frame`; any other
//! text is treated as a ping. Lagging subscribers lose frames, never block
//! the pump.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use browser_session::ScreencastFrame;

use crate::metrics;
use crate::server::state::AppState;

pub async fn screencast_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn frame_message(frame: &ScreencastFrame) -> Option<Message> {
    let payload = json!({
        "type": "screencast_frame",
        "session_id": frame.session_id,
        "frame": frame.frame,
        "timestamp": frame.timestamp,
    });
    serde_json::to_string(&payload).ok().map(Message::Text)
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut frames = state.screencast.subscribe();
    debug!("screencast subscriber connected");

    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Ok(frame) => {
                        metrics::record_screencast_frame(&frame.session_id);
                        let Some(message) = frame_message(&frame) else { continue };
                        if socket.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Back-pressure policy: drop frames, keep the stream.
                        debug!(skipped, "screencast subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if text.trim() == "get_current_frame" {
                            if let Some(frame) = state.screencast.current_frame() {
                                if let Some(message) = frame_message(&frame) {
                                    if socket.send(message).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                        // Anything else is a ping; ignore.
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
    debug!("screencast subscriber disconnected");
}
