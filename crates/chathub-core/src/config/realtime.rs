//! Real-time room and connection configuration.

use serde::{Deserialize, Serialize};

/// Buffers and limits for live rooms and their connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each room's inbound queue. Senders wait when it is full.
    #[serde(default = "default_room_inbox")]
    pub room_inbox_capacity: usize,
    /// Outbound frames buffered per connection before deliveries fail.
    #[serde(default = "default_connection_buffer")]
    pub connection_buffer_size: usize,
    /// Maximum accepted message body in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Default number of messages returned by history lookups.
    #[serde(default = "default_recent_limit")]
    pub recent_messages_limit: i64,
    /// Upper bound a caller may request from history lookups.
    #[serde(default = "default_recent_max")]
    pub recent_messages_max: i64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            room_inbox_capacity: default_room_inbox(),
            connection_buffer_size: default_connection_buffer(),
            max_message_bytes: default_max_message_bytes(),
            recent_messages_limit: default_recent_limit(),
            recent_messages_max: default_recent_max(),
        }
    }
}

fn default_room_inbox() -> usize {
    256
}

fn default_connection_buffer() -> usize {
    64
}

fn default_max_message_bytes() -> usize {
    4096
}

fn default_recent_limit() -> i64 {
    50
}

fn default_recent_max() -> i64 {
    200
}
