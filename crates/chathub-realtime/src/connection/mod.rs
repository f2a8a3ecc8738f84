//! Connection handles, the transport seam and the per-connection lifecycle.

pub mod channel;
pub mod handle;
pub mod lifecycle;
pub mod transport;

pub use channel::{ChannelPeer, ChannelTransport, PeerEvent};
pub use handle::{ChatIdentity, ConnectionHandle, DeliveryError};
pub use lifecycle::{ConnectionLifecycle, ROOM_CLOSED_REASON, ROOM_MISSING_REASON};
pub use transport::{ChatTransport, INTERNAL_ERROR, NORMAL_CLOSURE, TransportError};
