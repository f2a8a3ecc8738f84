//! The seam between the lifecycle and a concrete bidirectional transport.

use async_trait::async_trait;

/// Close code for a normal, expected closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code when the server hit an error on this connection.
pub const INTERNAL_ERROR: u16 = 1011;

/// Transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer is gone.
    #[error("connection closed")]
    Closed,
    /// Protocol or I/O failure.
    #[error("transport error: {0}")]
    Io(String),
}

/// A live bidirectional text transport owned by one connection task.
#[async_trait]
pub trait ChatTransport: Send {
    /// Next text payload from the peer, or `Ok(None)` once the peer closed.
    ///
    /// Must be cancel safe: the lifecycle polls it inside `select!`.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;

    /// Write one text frame.
    async fn send(&mut self, payload: &str) -> Result<(), TransportError>;

    /// Close with a code and reason. Calling it again does nothing.
    async fn close(&mut self, code: u16, reason: &str);
}
