//! Persistence worker pool configuration.

use serde::{Deserialize, Serialize};

/// Sizing for the pool that writes accepted messages to the durable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Number of worker tasks draining the queue.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Pending messages the queue holds before `submit` starts blocking.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Seconds to wait for the queue to drain on shutdown.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_seconds: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            drain_timeout_seconds: default_drain_timeout(),
        }
    }
}

fn default_workers() -> usize {
    10
}

fn default_queue_capacity() -> usize {
    100
}

fn default_drain_timeout() -> u64 {
    30
}
