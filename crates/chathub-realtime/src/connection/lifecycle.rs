//! Per-connection lifecycle: lookup, join, read loop, leave, close.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use chathub_core::config::RealtimeConfig;
use chathub_core::error::{AppError, ErrorKind};
use chathub_core::result::AppResult;
use chathub_core::types::RoomId;
use chathub_entity::ChatMessage;

use super::handle::{ChatIdentity, ConnectionHandle};
use super::transport::{ChatTransport, INTERNAL_ERROR, NORMAL_CLOSURE, TransportError};
use crate::message::validator::validate_body;
use crate::message::{Frame, OutboundMessage};
use crate::metrics::RealtimeMetrics;
use crate::room::RoomRegistry;

/// Close reason sent when the requested room is not open.
pub const ROOM_MISSING_REASON: &str = "Room does not exist";

/// Close reason sent after the room was closed under the connection.
pub const ROOM_CLOSED_REASON: &str = "Room closed";

/// Why the read loop ended.
#[derive(Debug)]
enum Exit {
    PeerClosed,
    Evicted,
    Transport(TransportError),
}

impl Exit {
    fn close_frame(&self) -> (u16, &'static str) {
        match self {
            Self::PeerClosed | Self::Transport(TransportError::Closed) => (NORMAL_CLOSURE, ""),
            Self::Evicted => (NORMAL_CLOSURE, ROOM_CLOSED_REASON),
            Self::Transport(TransportError::Io(_)) => (INTERNAL_ERROR, "Transport error"),
        }
    }
}

/// A joined connection's place in its room.
///
/// Released explicitly on the normal path. If the owning task is dropped
/// mid-session instead (aborted, or its runtime shutting down) the guard
/// marks the handle dead and schedules the leave itself, so the registry
/// never keeps a connection whose task is gone.
struct Membership {
    registry: Arc<RoomRegistry>,
    metrics: Arc<RealtimeMetrics>,
    room_id: RoomId,
    handle: Arc<ConnectionHandle>,
    held: bool,
}

impl Membership {
    fn new(
        registry: Arc<RoomRegistry>,
        metrics: Arc<RealtimeMetrics>,
        room_id: RoomId,
        handle: Arc<ConnectionHandle>,
    ) -> Self {
        metrics.connection_opened();
        Self {
            registry,
            metrics,
            room_id,
            handle,
            held: true,
        }
    }

    async fn release(mut self) {
        self.registry.leave(self.room_id, self.handle.id()).await;
        self.held = false;
        self.handle.mark_dead();
        self.metrics.connection_closed();
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        self.handle.mark_dead();
        self.metrics.connection_closed();

        let registry = Arc::clone(&self.registry);
        let room_id = self.room_id;
        let connection_id = self.handle.id();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    registry.leave(room_id, connection_id).await;
                });
                warn!(
                    room_id = %room_id,
                    connection_id = %connection_id,
                    "Connection task dropped mid-session, leaving room"
                );
            }
            Err(_) => warn!(
                room_id = %room_id,
                connection_id = %connection_id,
                "Connection task dropped outside a runtime, membership not released"
            ),
        }
    }
}

/// Drives accepted connections through their room.
#[derive(Debug, Clone)]
pub struct ConnectionLifecycle {
    registry: Arc<RoomRegistry>,
    metrics: Arc<RealtimeMetrics>,
    buffer_size: usize,
    max_message_bytes: usize,
}

impl ConnectionLifecycle {
    /// Build a lifecycle over a registry.
    pub fn new(
        registry: Arc<RoomRegistry>,
        metrics: Arc<RealtimeMetrics>,
        config: &RealtimeConfig,
    ) -> Self {
        Self {
            registry,
            metrics,
            buffer_size: config.connection_buffer_size,
            max_message_bytes: config.max_message_bytes,
        }
    }

    /// Run one connection to completion.
    ///
    /// The transport is closed exactly once on every path that runs to
    /// completion. If the task is dropped mid-session the connection
    /// still leaves its room, and the transport goes with the task. Returns
    /// `NotFound` if the room was not open, in which case the peer got a
    /// normal closure with [`ROOM_MISSING_REASON`] and nothing it sent
    /// was accepted.
    pub async fn run<T: ChatTransport>(
        &self,
        room_id: RoomId,
        identity: ChatIdentity,
        mut transport: T,
    ) -> AppResult<()> {
        let room = match self.registry.lookup(room_id).await {
            Ok(room) => room,
            Err(e) => return self.reject(&mut transport, room_id, &identity, e).await,
        };

        let (handle, outbound) = ConnectionHandle::new(identity, self.buffer_size);
        if let Err(e) = self.registry.join(room_id, Arc::clone(&handle)).await {
            let identity = handle.identity().clone();
            return self.reject(&mut transport, room_id, &identity, e).await;
        }
        let membership = Membership::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.metrics),
            room_id,
            Arc::clone(&handle),
        );
        info!(
            room_id = %room_id,
            connection_id = %handle.id(),
            user_id = %handle.identity().user_id,
            username = %handle.identity().username,
            "Connection joined room"
        );

        let joined = OutboundMessage::Joined {
            room_id,
            room_name: room.name,
            connection_id: handle.id(),
        };
        let exit = match joined.to_frame() {
            Ok(frame) => match transport.send(&frame).await {
                Ok(()) => self.session(room_id, &handle, outbound, &mut transport).await,
                Err(e) => Exit::Transport(e),
            },
            Err(e) => {
                warn!(connection_id = %handle.id(), error = %e, "Failed to encode joined frame");
                Exit::Transport(TransportError::Io(e.message))
            }
        };

        membership.release().await;
        let (code, reason) = exit.close_frame();
        transport.close(code, reason).await;

        match &exit {
            Exit::Transport(TransportError::Io(e)) => warn!(
                room_id = %room_id,
                connection_id = %handle.id(),
                error = %e,
                "Connection ended on transport error"
            ),
            other => info!(
                room_id = %room_id,
                connection_id = %handle.id(),
                exit = ?other,
                "Connection closed"
            ),
        }
        Ok(())
    }

    async fn reject<T: ChatTransport>(
        &self,
        transport: &mut T,
        room_id: RoomId,
        identity: &ChatIdentity,
        err: AppError,
    ) -> AppResult<()> {
        self.metrics.connection_rejected();
        let reason = if err.is(ErrorKind::NotFound) {
            ROOM_MISSING_REASON
        } else {
            "Join rejected"
        };
        transport.close(NORMAL_CLOSURE, reason).await;
        info!(
            room_id = %room_id,
            user_id = %identity.user_id,
            error = %err,
            "Connection rejected"
        );
        Err(err)
    }

    async fn session<T: ChatTransport>(
        &self,
        room_id: RoomId,
        handle: &ConnectionHandle,
        mut outbound: mpsc::Receiver<Frame>,
        transport: &mut T,
    ) -> Exit {
        loop {
            tokio::select! {
                biased;
                _ = handle.evicted() => {
                    // Whatever the broadcaster queued, room_closed included.
                    while let Ok(frame) = outbound.try_recv() {
                        if let Err(e) = transport.send(&frame).await {
                            return Exit::Transport(e);
                        }
                    }
                    return Exit::Evicted;
                }
                Some(frame) = outbound.recv() => {
                    if let Err(e) = transport.send(&frame).await {
                        return Exit::Transport(e);
                    }
                }
                incoming = transport.recv() => match incoming {
                    Ok(Some(text)) => {
                        if let Err(e) = self.accept(room_id, handle, &text).await {
                            debug!(connection_id = %handle.id(), error = %e, "Payload rejected");
                            let reply = OutboundMessage::error(&e).to_frame();
                            if let Ok(frame) = reply {
                                if let Err(e) = transport.send(&frame).await {
                                    return Exit::Transport(e);
                                }
                            }
                        }
                    }
                    Ok(None) => return Exit::PeerClosed,
                    Err(e) => return Exit::Transport(e),
                },
            }
        }
    }

    /// Turn one payload into a message on the room inbox.
    async fn accept(&self, room_id: RoomId, handle: &ConnectionHandle, raw: &str) -> AppResult<()> {
        let body = validate_body(raw, self.max_message_bytes)?;
        let msg = ChatMessage::new(handle.identity().user_id, room_id, body);
        self.registry.publish(msg).await
    }
}
