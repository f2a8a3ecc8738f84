//! # chathub-realtime
//!
//! Live side of ChatHub:
//!
//! - [`RoomRegistry`]: which rooms are open and which connections sit in each
//! - [`RoomBroadcaster`](room::broadcaster::RoomBroadcaster): one task per open
//!   room that hands each message to the persistence pool, then fans it out
//! - [`connection`]: connection handles, the transport seam and the
//!   per-connection lifecycle
//! - [`ChatEngine`]: the facade the HTTP layer talks to

pub mod connection;
pub mod message;
pub mod metrics;
pub mod room;
pub mod server;

pub use connection::handle::{ChatIdentity, ConnectionHandle};
pub use connection::lifecycle::ConnectionLifecycle;
pub use connection::transport::{ChatTransport, TransportError};
pub use metrics::MetricsSnapshot;
pub use room::{BroadcasterState, CloseOutcome, RoomDescriptor, RoomRegistry};
pub use server::ChatEngine;
