//! Open rooms: the registry and the per-room broadcaster task.

pub mod broadcaster;
pub mod registry;
mod state;

pub use broadcaster::{BroadcasterState, RoomBroadcaster};
pub use registry::{CloseOutcome, RoomDescriptor, RoomRegistry};
