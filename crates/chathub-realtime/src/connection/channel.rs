//! In-process transport backed by tokio channels.
//!
//! Lets the lifecycle run without a socket: local tools and tests drive
//! the [`ChannelPeer`] end the way a remote client drives a WebSocket.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::transport::{ChatTransport, TransportError};

/// What the peer observes from the server side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A text frame.
    Frame(String),
    /// The server closed the connection.
    Closed {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Server side of an in-process connection.
#[derive(Debug)]
pub struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<PeerEvent>,
    close_calls: Arc<AtomicUsize>,
    closed: bool,
}

/// Client side of an in-process connection.
#[derive(Debug)]
pub struct ChannelPeer {
    to_server: Option<mpsc::UnboundedSender<String>>,
    from_server: mpsc::UnboundedReceiver<PeerEvent>,
    close_calls: Arc<AtomicUsize>,
}

impl ChannelTransport {
    /// Create a connected transport/peer pair.
    pub fn pair() -> (Self, ChannelPeer) {
        let (to_server, inbound) = mpsc::unbounded_channel();
        let (outbound, from_server) = mpsc::unbounded_channel();
        let close_calls = Arc::new(AtomicUsize::new(0));

        let transport = Self {
            inbound,
            outbound,
            close_calls: Arc::clone(&close_calls),
            closed: false,
        };
        let peer = ChannelPeer {
            to_server: Some(to_server),
            from_server,
            close_calls,
        };
        (transport, peer)
    }
}

#[async_trait]
impl ChatTransport for ChannelTransport {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.inbound.recv().await)
    }

    async fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(PeerEvent::Frame(payload.to_string()))
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self, code: u16, reason: &str) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.outbound.send(PeerEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }
}

impl ChannelPeer {
    /// Send a text payload to the server. Returns `false` once hung up.
    pub fn send(&self, text: impl Into<String>) -> bool {
        match &self.to_server {
            Some(tx) => tx.send(text.into()).is_ok(),
            None => false,
        }
    }

    /// Next event from the server, `None` once the server side is dropped.
    pub async fn next_event(&mut self) -> Option<PeerEvent> {
        self.from_server.recv().await
    }

    /// Stop sending. The server sees an orderly peer close.
    pub fn hang_up(&mut self) {
        self.to_server = None;
    }

    /// How many times the server invoked `close`.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}
