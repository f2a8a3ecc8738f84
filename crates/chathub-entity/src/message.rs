//! Chat message entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use chathub_core::types::{MessageId, RoomId, UserId};

/// One chat message.
///
/// `id` stays `None` until the store has saved the message. Fields are
/// never mutated after construction; [`ChatMessage::persisted`] yields a
/// new value instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    /// Store-assigned identifier, if saved.
    pub id: Option<MessageId>,
    /// Authenticated author.
    pub author_id: UserId,
    /// Room the message was posted to.
    pub room_id: RoomId,
    /// Message text.
    pub body: String,
    /// When the payload was accepted from the connection.
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build an unsaved message stamped with the current time.
    pub fn new(author_id: UserId, room_id: RoomId, body: impl Into<String>) -> Self {
        Self::at(author_id, room_id, body, Utc::now())
    }

    /// Build an unsaved message with an explicit timestamp.
    pub fn at(
        author_id: UserId,
        room_id: RoomId,
        body: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            author_id,
            room_id,
            body: body.into(),
            sent_at,
        }
    }

    /// Copy of this message carrying the identifier the store assigned.
    pub fn persisted(&self, id: MessageId) -> Self {
        Self {
            id: Some(id),
            ..self.clone()
        }
    }

    /// Whether the store has assigned an identifier.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Body cut to at most `max_chars` characters, for log lines.
    pub fn preview(&self, max_chars: usize) -> String {
        match self.body.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &self.body[..idx]),
            None => self.body.clone(),
        }
    }
}
