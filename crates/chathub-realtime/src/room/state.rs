//! Registry-owned record of one open room.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use chathub_core::types::ConnectionId;
use chathub_entity::{ChatMessage, Room};

use super::broadcaster::BroadcasterState;
use crate::connection::handle::ConnectionHandle;

/// Final roster handed to the broadcaster when its room closes.
pub(crate) type Roster = Vec<Arc<ConnectionHandle>>;

/// Live state of an open room. Only exists while the room is open;
/// removing it from the registry is the close.
#[derive(Debug)]
pub(crate) struct RoomState {
    pub(crate) room: Room,
    pub(crate) inbox: mpsc::Sender<ChatMessage>,
    pub(crate) clients: Roster,
    pub(crate) close_signal: oneshot::Sender<Roster>,
    pub(crate) broadcaster_state: watch::Receiver<BroadcasterState>,
    pub(crate) task: JoinHandle<()>,
}

impl RoomState {
    /// Removes a client. Returns whether it was present.
    pub(crate) fn remove(&mut self, connection_id: ConnectionId) -> bool {
        let before = self.clients.len();
        self.clients.retain(|c| c.id() != connection_id);
        self.clients.len() < before
    }
}
