//! The durable store the realtime core persists through.

use async_trait::async_trait;
use sqlx::PgPool;

use chathub_core::result::AppResult;
use chathub_core::types::{MessageId, RoomId};
use chathub_entity::{ChatMessage, Room};

use crate::repositories::{MessageRepository, RoomRepository};

/// Durable room and message storage.
///
/// Implementations enforce room-name uniqueness and that a message
/// references an existing room. Concurrency control is theirs.
#[async_trait]
pub trait ChatStore: Send + Sync + std::fmt::Debug + 'static {
    /// Create a room. Fails with `Conflict` if the name is taken.
    async fn create_room(&self, name: &str) -> AppResult<Room>;

    /// Find a room by id.
    async fn find_room(&self, id: RoomId) -> AppResult<Option<Room>>;

    /// Find a room by name.
    async fn find_room_by_name(&self, name: &str) -> AppResult<Option<Room>>;

    /// Whether a room exists.
    async fn room_exists(&self, id: RoomId) -> AppResult<bool> {
        Ok(self.find_room(id).await?.is_some())
    }

    /// Every durable room, newest first.
    async fn list_rooms(&self) -> AppResult<Vec<Room>>;

    /// Save a message. Fails with `NotFound` if its room does not exist.
    async fn save_message(&self, msg: &ChatMessage) -> AppResult<MessageId>;

    /// Up to `limit` messages of a room, most recent first.
    async fn fetch_recent(&self, room_id: RoomId, limit: i64) -> AppResult<Vec<ChatMessage>>;
}

/// [`ChatStore`] backed by the PostgreSQL repositories.
#[derive(Debug, Clone)]
pub struct PgChatStore {
    rooms: RoomRepository,
    messages: MessageRepository,
}

impl PgChatStore {
    /// Build a store over a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            rooms: RoomRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
        }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn create_room(&self, name: &str) -> AppResult<Room> {
        self.rooms.create(name).await
    }

    async fn find_room(&self, id: RoomId) -> AppResult<Option<Room>> {
        self.rooms.find_by_id(id).await
    }

    async fn find_room_by_name(&self, name: &str) -> AppResult<Option<Room>> {
        self.rooms.find_by_name(name).await
    }

    async fn room_exists(&self, id: RoomId) -> AppResult<bool> {
        self.rooms.exists(id).await
    }

    async fn list_rooms(&self) -> AppResult<Vec<Room>> {
        self.rooms.find_all().await
    }

    async fn save_message(&self, msg: &ChatMessage) -> AppResult<MessageId> {
        self.messages.insert(msg).await
    }

    async fn fetch_recent(&self, room_id: RoomId, limit: i64) -> AppResult<Vec<ChatMessage>> {
        self.messages.find_recent(room_id, limit).await
    }
}
