//! WebSocket upgrade handler.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use tracing::{debug, info};

use chathub_core::types::RoomId;
use chathub_realtime::{ChatTransport, TransportError};

use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /ws/{room_id}
///
/// Authentication happens before the upgrade. Whether the room is open is
/// decided after it, so a missing room is reported with a close frame.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    auth: AuthUser,
    ws: WebSocketUpgrade,
) -> Response {
    let max_bytes = state.config.realtime.max_message_bytes;
    ws.max_message_size(max_bytes.saturating_mul(4).max(1024))
        .on_upgrade(move |socket| async move {
            info!(room_id = %room_id, user_id = %auth.user_id, "WebSocket connection established");
            let transport = AxumTransport::new(socket);
            if let Err(e) = state
                .engine
                .accept_connection(room_id, auth.identity(), transport)
                .await
            {
                debug!(room_id = %room_id, error = %e, "WebSocket connection refused");
            }
        })
}

/// [`ChatTransport`] over an axum WebSocket.
pub struct AxumTransport {
    socket: WebSocket,
    closed: bool,
}

impl AxumTransport {
    /// Wrap an upgraded socket.
    pub fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            closed: false,
        }
    }
}

#[async_trait]
impl ChatTransport for AxumTransport {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        if self.closed {
            return Ok(None);
        }
        loop {
            match self.socket.recv().await {
                None | Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Binary(bytes))) => {
                    return String::from_utf8(bytes.to_vec())
                        .map(Some)
                        .map_err(|_| TransportError::Io("Binary frame is not UTF-8".to_string()));
                }
                // Pings are answered by axum.
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Err(e)) => return Err(TransportError::Io(e.to_string())),
            }
        }
    }

    async fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.socket
            .send(Message::Text(payload.into()))
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self, code: u16, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        let frame = CloseFrame {
            code,
            reason: reason.into(),
        };
        let _ = self.socket.send(Message::Close(Some(frame))).await;
    }
}
