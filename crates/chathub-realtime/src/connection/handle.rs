//! Handle to one live connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use chathub_core::types::{ConnectionId, UserId};

use crate::message::Frame;

/// The already-authenticated user driving a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatIdentity {
    /// Authenticated user.
    pub user_id: UserId,
    /// Username, for logs.
    pub username: String,
}

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection's outbound buffer is full.
    #[error("outbound buffer full")]
    Full,
    /// The connection's writer has gone away.
    #[error("connection closed")]
    Closed,
}

/// Non-owning handle to a live connection.
///
/// The task that accepted the connection owns the transport. Everything
/// else, the room registry included, can only queue frames through this
/// handle or ask the owner to leave via [`ConnectionHandle::evict`].
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    identity: ChatIdentity,
    sender: mpsc::Sender<Frame>,
    evicted: CancellationToken,
    alive: AtomicBool,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its owner drains into the transport.
    pub fn new(identity: ChatIdentity, buffer: usize) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let handle = Self {
            id: ConnectionId::new(),
            identity,
            sender,
            evicted: CancellationToken::new(),
            alive: AtomicBool::new(true),
        };
        (Arc::new(handle), receiver)
    }

    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Authenticated identity.
    pub fn identity(&self) -> &ChatIdentity {
        &self.identity
    }

    /// Queue a frame without waiting.
    pub fn deliver(&self, frame: Frame) -> Result<(), DeliveryError> {
        if !self.is_alive() {
            return Err(DeliveryError::Closed);
        }
        match self.sender.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(DeliveryError::Full),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                Err(DeliveryError::Closed)
            }
        }
    }

    /// Ask the owning task to wind the connection down.
    pub fn evict(&self) {
        self.evicted.cancel();
    }

    /// Resolves once [`evict`](Self::evict) has been called.
    pub async fn evicted(&self) {
        self.evicted.cancelled().await
    }

    /// Whether eviction was requested.
    pub fn is_evicted(&self) -> bool {
        self.evicted.is_cancelled()
    }

    /// Check if connection is alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark connection as dead
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ChatIdentity {
        ChatIdentity {
            user_id: UserId::new(),
            username: "alice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_deliver_until_full() {
        let (handle, mut rx) = ConnectionHandle::new(identity(), 2);
        handle.deliver(Frame::from("a")).unwrap();
        handle.deliver(Frame::from("b")).unwrap();
        assert_eq!(handle.deliver(Frame::from("c")), Err(DeliveryError::Full));

        assert_eq!(&*rx.recv().await.unwrap(), "a");
        handle.deliver(Frame::from("c")).unwrap();
    }

    #[tokio::test]
    async fn test_dropped_receiver_marks_dead() {
        let (handle, rx) = ConnectionHandle::new(identity(), 2);
        drop(rx);
        assert_eq!(handle.deliver(Frame::from("a")), Err(DeliveryError::Closed));
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn test_evict_wakes_owner() {
        let (handle, _rx) = ConnectionHandle::new(identity(), 1);
        let waiter = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move { handle.evicted().await })
        };
        assert!(!handle.is_evicted());
        handle.evict();
        waiter.await.unwrap();
        assert!(handle.is_evicted());
    }
}
