//! Message repository implementation.

use sqlx::PgPool;

use chathub_core::error::{AppError, ErrorKind};
use chathub_core::result::AppResult;
use chathub_core::types::{MessageId, RoomId};
use chathub_entity::ChatMessage;

/// Repository for the `messages` table.
#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    /// Create a new message repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a message and return its new id.
    ///
    /// The foreign key on `room_id` enforces that the room exists; a
    /// violation maps to `NotFound`.
    pub async fn insert(&self, msg: &ChatMessage) -> AppResult<MessageId> {
        sqlx::query_scalar::<_, MessageId>(
            "INSERT INTO messages (author_id, room_id, body, sent_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(msg.author_id)
        .bind(msg.room_id)
        .bind(&msg.body)
        .bind(msg.sent_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some("messages_room_id_fkey") =>
            {
                AppError::not_found(format!("Room {} does not exist", msg.room_id))
            }
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some("messages_author_id_fkey") =>
            {
                AppError::not_found(format!("User {} does not exist", msg.author_id))
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to save message", e),
        })
    }

    /// The `limit` most recent messages of a room, newest first.
    pub async fn find_recent(&self, room_id: RoomId, limit: i64) -> AppResult<Vec<ChatMessage>> {
        sqlx::query_as::<_, ChatMessage>(
            "SELECT id, author_id, room_id, body, sent_at FROM messages \
             WHERE room_id = $1 \
             ORDER BY sent_at DESC \
             LIMIT $2",
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to fetch recent messages", e)
        })
    }
}
