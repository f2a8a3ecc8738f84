//! Server-to-client frame definitions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chathub_core::error::AppError;
use chathub_core::result::AppResult;
use chathub_core::types::{ConnectionId, MessageId, RoomId, UserId};
use chathub_entity::ChatMessage;

/// A serialized outbound frame. Serialized once per fan-out and shared
/// between every recipient.
pub type Frame = Arc<str>;

/// Frames sent by the server to the client. Clients send plain text,
/// one chat message per text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// The connection is now part of the room.
    Joined {
        /// Room joined.
        room_id: RoomId,
        /// Room display name.
        room_name: String,
        /// This connection's id.
        connection_id: ConnectionId,
    },
    /// A chat message posted to the room.
    Message {
        /// Set when the message was already saved.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        id: Option<MessageId>,
        /// Room the message belongs to.
        room_id: RoomId,
        /// Author.
        author_id: UserId,
        /// Message text.
        body: String,
        /// Acceptance timestamp.
        sent_at: DateTime<Utc>,
    },
    /// A payload from this connection was rejected.
    Error {
        /// Machine-readable code.
        code: String,
        /// Human-readable message.
        message: String,
    },
    /// The room was closed. No further messages will arrive.
    RoomClosed {
        /// Room that closed.
        room_id: RoomId,
    },
}

impl OutboundMessage {
    /// Frame for a chat message.
    pub fn chat(msg: &ChatMessage) -> Self {
        Self::Message {
            id: msg.id,
            room_id: msg.room_id,
            author_id: msg.author_id,
            body: msg.body.clone(),
            sent_at: msg.sent_at,
        }
    }

    /// Frame describing a rejected payload.
    pub fn error(err: &AppError) -> Self {
        Self::Error {
            code: err.kind.to_string(),
            message: err.message.clone(),
        }
    }

    /// Serialize to a shareable text frame.
    pub fn to_frame(&self) -> AppResult<Frame> {
        Ok(Arc::from(serde_json::to_string(self)?))
    }
}
