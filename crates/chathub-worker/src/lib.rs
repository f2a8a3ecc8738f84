//! Persistence worker pool for ChatHub.
//!
//! Accepted messages are queued in a bounded channel and written to the
//! durable store by a fixed set of worker tasks:
//! - `submit` waits while the queue is full, it never drops
//! - a failed save is logged and not retried
//! - shutdown stops intake and lets workers drain what is queued

pub mod error;
pub mod pool;
pub mod stats;
mod worker;

pub use error::SubmitError;
pub use pool::PersistencePool;
pub use stats::{PoolStats, PoolStatsSnapshot};
