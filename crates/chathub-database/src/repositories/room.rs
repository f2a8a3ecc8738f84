//! Room repository implementation.

use sqlx::PgPool;

use chathub_core::error::{AppError, ErrorKind};
use chathub_core::result::AppResult;
use chathub_core::types::RoomId;
use chathub_entity::Room;

/// Repository for the `rooms` table.
#[derive(Debug, Clone)]
pub struct RoomRepository {
    pool: PgPool,
}

impl RoomRepository {
    /// Create a new room repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a room. A duplicate name maps to `Conflict`.
    pub async fn create(&self, name: &str) -> AppResult<Room> {
        sqlx::query_as::<_, Room>(
            "INSERT INTO rooms (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.constraint() == Some("rooms_name_key") => {
                AppError::conflict(format!("Room '{name}' already exists"))
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create room", e),
        })
    }

    /// Find a room by primary key.
    pub async fn find_by_id(&self, id: RoomId) -> AppResult<Option<Room>> {
        sqlx::query_as::<_, Room>("SELECT id, name, created_at FROM rooms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find room by id", e))
    }

    /// Find a room by its unique name.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<Room>> {
        sqlx::query_as::<_, Room>("SELECT id, name, created_at FROM rooms WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find room by name", e)
            })
    }

    /// Whether a room with this id exists.
    pub async fn exists(&self, id: RoomId) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM rooms WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check room", e))
    }

    /// All rooms, newest first.
    pub async fn find_all(&self) -> AppResult<Vec<Room>> {
        sqlx::query_as::<_, Room>("SELECT id, name, created_at FROM rooms ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list rooms", e))
    }
}
