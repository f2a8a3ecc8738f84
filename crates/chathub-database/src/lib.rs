//! # chathub-database
//!
//! PostgreSQL connection management, embedded migrations, repositories
//! for users, rooms and messages, and the [`ChatStore`] interface the
//! realtime core persists through.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryChatStore;
pub use store::{ChatStore, PgChatStore};
