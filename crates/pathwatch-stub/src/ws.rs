//! `WebSocket` handler for the glyph event stream.
//!
//! Clients connect to `GET /ws/path/glyph` and receive one JSON text frame
//! per published [`StreamFrame`]. Every client holds its own receiver on
//! the shared broadcast channel, so [`AppState::stream_clients`] doubles as
//! the connected-client count. Anything a client sends is ignored apart
//! from the close frame.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use pathwatch_types::StreamFrame;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, trace, warn};

use crate::state::AppState;

/// Upgrade to a `WebSocket` and stream frames until the client leaves.
///
/// # Route
///
/// `GET /ws/path/glyph`
pub async fn ws_glyph(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Why a client session ended.
#[derive(Debug)]
enum Ended {
    ClientClosed,
    ClientError,
    SendFailed,
    ChannelClosed,
}

/// Per-connection delivery counts.
#[derive(Debug, Default)]
struct Session {
    forwarded: u64,
    skipped: u64,
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let frames = state.subscribe();
    info!(clients = state.stream_clients(), "stream client joined");

    let mut session = Session::default();
    let ended = session.pump(socket, frames).await;

    // The receiver is dropped once `pump` returns.
    info!(
        reason = ?ended,
        forwarded = session.forwarded,
        skipped = session.skipped,
        remaining = state.stream_clients(),
        "stream client left"
    );
}

impl Session {
    async fn pump(
        &mut self,
        mut socket: WebSocket,
        mut frames: broadcast::Receiver<StreamFrame>,
    ) -> Ended {
        loop {
            tokio::select! {
                received = frames.recv() => match received {
                    Ok(frame) => {
                        let Some(message) = encode(&frame) else { continue };
                        if socket.send(message).await.is_err() {
                            return Ended::SendFailed;
                        }
                        self.forwarded = self.forwarded.saturating_add(1);
                        trace!(kind = frame_kind(&frame), "frame forwarded");
                    }
                    Err(RecvError::Lagged(n)) => {
                        self.skipped = self.skipped.saturating_add(n);
                        debug!(skipped = n, "stream client lagged");
                    }
                    Err(RecvError::Closed) => return Ended::ChannelClosed,
                },
                inbound = socket.recv() => match inbound {
                    Some(Ok(Message::Close(_))) | None => return Ended::ClientClosed,
                    Some(Err(e)) => {
                        debug!(error = %e, "stream client error");
                        return Ended::ClientError;
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
    }
}

/// Serialize a frame as a text message.
fn encode(frame: &StreamFrame) -> Option<Message> {
    serde_json::to_string(frame)
        .inspect_err(|e| warn!(kind = frame_kind(frame), error = %e, "failed to serialize stream frame"))
        .ok()
        .map(|json| Message::Text(json.into()))
}

/// The frame's discriminator, whichever key carries it.
fn frame_kind(frame: &StreamFrame) -> &str {
    frame
        .kind
        .as_deref()
        .or(frame.event_type.as_deref())
        .unwrap_or("untyped")
}
