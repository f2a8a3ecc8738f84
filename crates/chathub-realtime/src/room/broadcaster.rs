//! Per-room task that persists and fans out messages in submission order.

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use chathub_core::types::RoomId;
use chathub_entity::ChatMessage;
use chathub_worker::PersistencePool;

use super::registry::RoomRegistry;
use super::state::Roster;
use crate::connection::ConnectionHandle;
use crate::message::OutboundMessage;
use crate::metrics::RealtimeMetrics;

/// Lifecycle of a broadcaster task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcasterState {
    /// Consuming the room inbox.
    Running,
    /// Close observed. Intake is shut and buffered messages are going out.
    Draining,
    /// Finished.
    Stopped,
}

/// The single consumer of one room's inbox.
///
/// Each message is submitted to the persistence pool exactly once and
/// then written to a snapshot of the room's connections. A failed write
/// to one connection is logged and never stops the others.
pub struct RoomBroadcaster {
    room_id: RoomId,
    inbox: mpsc::Receiver<ChatMessage>,
    close_signal: oneshot::Receiver<Roster>,
    state: watch::Sender<BroadcasterState>,
    registry: Weak<RoomRegistry>,
    pool: Arc<PersistencePool>,
    metrics: Arc<RealtimeMetrics>,
}

impl RoomBroadcaster {
    pub(crate) fn new(
        room_id: RoomId,
        inbox: mpsc::Receiver<ChatMessage>,
        close_signal: oneshot::Receiver<Roster>,
        state: watch::Sender<BroadcasterState>,
        registry: Weak<RoomRegistry>,
        pool: Arc<PersistencePool>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        Self {
            room_id,
            inbox,
            close_signal,
            state,
            registry,
            pool,
            metrics,
        }
    }

    /// Runs until the room is closed and its inbox drained.
    pub async fn run(mut self) {
        debug!(room_id = %self.room_id, "Broadcaster running");

        let roster = loop {
            tokio::select! {
                biased;
                signal = &mut self.close_signal => break signal.unwrap_or_default(),
                next = self.inbox.recv() => {
                    // Senders only all go away once the room has left the registry.
                    let Some(msg) = next else { break self.final_roster().await };
                    match self.live_roster().await {
                        Some(targets) => self.dispatch(msg, &targets).await,
                        None => {
                            let roster = self.final_roster().await;
                            self.dispatch(msg, &roster).await;
                            break roster;
                        }
                    }
                }
            }
        };

        // Shut intake before anyone can observe Draining.
        self.inbox.close();
        self.state.send_replace(BroadcasterState::Draining);

        let mut drained = 0usize;
        while let Some(msg) = self.inbox.recv().await {
            self.dispatch(msg, &roster).await;
            drained += 1;
        }

        if let Ok(frame) = (OutboundMessage::RoomClosed {
            room_id: self.room_id,
        })
        .to_frame()
        {
            for conn in &roster {
                let _ = conn.deliver(frame.clone());
            }
        }
        for conn in &roster {
            conn.evict();
        }

        self.state.send_replace(BroadcasterState::Stopped);
        info!(
            room_id = %self.room_id,
            drained,
            evicted = roster.len(),
            "Broadcaster stopped"
        );
    }

    /// Roster handed over by `close`. Empty if the registry itself is gone.
    async fn final_roster(&mut self) -> Roster {
        (&mut self.close_signal).await.unwrap_or_default()
    }

    async fn live_roster(&self) -> Option<Roster> {
        let registry = self.registry.upgrade()?;
        registry.list_connections(self.room_id).await.ok()
    }

    async fn dispatch(&self, msg: ChatMessage, targets: &[Arc<ConnectionHandle>]) {
        let encoded = OutboundMessage::chat(&msg).to_frame();

        if let Err(e) = self.pool.submit(msg).await {
            let msg = e.into_message();
            warn!(
                room_id = %msg.room_id,
                author_id = %msg.author_id,
                body = %msg.preview(64),
                "Persistence pool closed, message not saved"
            );
        }

        let frame = match encoded {
            Ok(frame) => frame,
            Err(e) => {
                warn!(room_id = %self.room_id, error = %e, "Failed to encode message frame");
                return;
            }
        };

        for conn in targets {
            match conn.deliver(frame.clone()) {
                Ok(()) => self.metrics.message_delivered(),
                Err(e) => {
                    self.metrics.delivery_failed();
                    warn!(
                        room_id = %self.room_id,
                        connection_id = %conn.id(),
                        error = %e,
                        "Delivery failed"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for RoomBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomBroadcaster")
            .field("room_id", &self.room_id)
            .field("state", &*self.state.borrow())
            .finish()
    }
}
