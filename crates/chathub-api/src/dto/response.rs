//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chathub_core::types::{MessageId, RoomId, UserId};
use chathub_entity::{ChatMessage, Room, User};
use chathub_realtime::{CloseOutcome, MetricsSnapshot};
use chathub_worker::PoolStatsSnapshot;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// User summary for responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    /// User ID.
    pub id: UserId,
    /// Username.
    pub username: String,
    /// Email.
    pub email: String,
    /// Registered at.
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Login response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Access token.
    pub token: String,
    /// Seconds until the token expires.
    pub expires_in: i64,
    /// User info.
    pub user: UserResponse,
}

/// Durable room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomResponse {
    /// Room ID.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// Created at.
    pub created_at: DateTime<Utc>,
    /// Whether the room currently has live state.
    pub open: bool,
}

impl RoomResponse {
    /// Pair a durable room with its live status.
    pub fn new(room: Room, open: bool) -> Self {
        Self {
            id: room.id,
            name: room.name,
            created_at: room.created_at,
            open,
        }
    }
}

/// Outcome of closing a room's live state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseRoomResponse {
    /// Room ID.
    pub room_id: RoomId,
    /// `closed` or `already_closed`.
    pub outcome: CloseOutcome,
}

/// Stored chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message ID.
    pub id: Option<MessageId>,
    /// Room ID.
    pub room_id: RoomId,
    /// Author ID.
    pub author_id: UserId,
    /// Text.
    pub body: String,
    /// Accepted at.
    pub sent_at: DateTime<Utc>,
}

impl From<ChatMessage> for MessageResponse {
    fn from(msg: ChatMessage) -> Self {
        Self {
            id: msg.id,
            room_id: msg.room_id,
            author_id: msg.author_id,
            body: msg.body,
            sent_at: msg.sent_at,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    /// Server version.
    pub version: String,
    /// `connected` or `unavailable`.
    pub database: String,
    /// Rooms with live state.
    pub open_rooms: usize,
    /// Realtime counters.
    pub realtime: MetricsSnapshot,
    /// Persistence pool counters.
    pub persistence: PoolStatsSnapshot,
}
