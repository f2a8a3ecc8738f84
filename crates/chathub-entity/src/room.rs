//! Room entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use chathub_core::types::RoomId;

/// A named durable room. Existence in the store is authoritative; the
/// realtime registry only mirrors rooms that currently have live traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Room {
    /// Store-assigned identifier.
    pub id: RoomId,
    /// Display name, unique across rooms.
    pub name: String,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
}
