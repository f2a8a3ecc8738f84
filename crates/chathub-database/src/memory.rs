//! In-process [`ChatStore`] used by tests and database-less local runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use chathub_core::error::AppError;
use chathub_core::result::AppResult;
use chathub_core::types::{MessageId, RoomId};
use chathub_entity::{ChatMessage, Room};

use crate::store::ChatStore;

#[derive(Debug, Default)]
struct Tables {
    rooms: Vec<Room>,
    messages: Vec<ChatMessage>,
}

/// Memory-backed store with the same uniqueness and referential rules
/// as the PostgreSQL schema.
#[derive(Debug, Default)]
pub struct MemoryChatStore {
    tables: RwLock<Tables>,
    fail_saves: AtomicBool,
    create_room_calls: AtomicUsize,
}

impl MemoryChatStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `save_message` fail with a database error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of `create_room` calls, successful or not.
    pub fn create_room_calls(&self) -> usize {
        self.create_room_calls.load(Ordering::SeqCst)
    }

    /// Number of saved messages.
    pub async fn message_count(&self) -> usize {
        self.tables.read().await.messages.len()
    }

    /// Saved messages in insertion order.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.tables.read().await.messages.clone()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn create_room(&self, name: &str) -> AppResult<Room> {
        self.create_room_calls.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.write().await;
        if tables.rooms.iter().any(|r| r.name == name) {
            return Err(AppError::conflict(format!("Room '{name}' already exists")));
        }
        let room = Room {
            id: RoomId::new(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        tables.rooms.push(room.clone());
        Ok(room)
    }

    async fn find_room(&self, id: RoomId) -> AppResult<Option<Room>> {
        let tables = self.tables.read().await;
        Ok(tables.rooms.iter().find(|r| r.id == id).cloned())
    }

    async fn find_room_by_name(&self, name: &str) -> AppResult<Option<Room>> {
        let tables = self.tables.read().await;
        Ok(tables.rooms.iter().find(|r| r.name == name).cloned())
    }

    async fn list_rooms(&self) -> AppResult<Vec<Room>> {
        let tables = self.tables.read().await;
        let mut rooms = tables.rooms.clone();
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rooms)
    }

    async fn save_message(&self, msg: &ChatMessage) -> AppResult<MessageId> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AppError::database("Simulated store failure"));
        }
        let mut tables = self.tables.write().await;
        if !tables.rooms.iter().any(|r| r.id == msg.room_id) {
            return Err(AppError::not_found(format!(
                "Room {} does not exist",
                msg.room_id
            )));
        }
        let id = MessageId::new();
        tables.messages.push(msg.persisted(id));
        Ok(id)
    }

    async fn fetch_recent(&self, room_id: RoomId, limit: i64) -> AppResult<Vec<ChatMessage>> {
        let tables = self.tables.read().await;
        let mut recent: Vec<ChatMessage> = tables
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        recent.truncate(limit.max(0) as usize);
        Ok(recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chathub_core::error::ErrorKind;
    use chathub_core::types::UserId;

    #[tokio::test]
    async fn test_duplicate_room_name_conflicts() {
        let store = MemoryChatStore::new();
        store.create_room("general").await.unwrap();
        let err = store.create_room("general").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(store.list_rooms().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_requires_existing_room() {
        let store = MemoryChatStore::new();
        let msg = ChatMessage::new(UserId::new(), RoomId::new(), "orphan");
        let err = store.save_message(&msg).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(store.message_count().await, 0);
    }

    #[tokio::test]
    async fn test_fetch_recent_newest_first_with_limit() {
        let store = MemoryChatStore::new();
        let room = store.create_room("general").await.unwrap();
        let author = UserId::new();
        let base = Utc::now();
        for i in 0..5 {
            let msg = ChatMessage::at(
                author,
                room.id,
                format!("m{i}"),
                base + chrono::Duration::seconds(i),
            );
            store.save_message(&msg).await.unwrap();
        }

        let recent = store.fetch_recent(room.id, 3).await.unwrap();
        let bodies: Vec<&str> = recent.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["m4", "m3", "m2"]);
        assert!(recent.iter().all(|m| m.is_persisted()));
    }

    #[tokio::test]
    async fn test_simulated_failure() {
        let store = MemoryChatStore::new();
        let room = store.create_room("general").await.unwrap();
        store.set_fail_saves(true);
        let msg = ChatMessage::new(UserId::new(), room.id, "lost");
        let err = store.save_message(&msg).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Database);
    }
}
