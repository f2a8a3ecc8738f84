//! # chathub-entity
//!
//! Row types for the three durable tables: rooms, messages and users.

pub mod message;
pub mod room;
pub mod user;

pub use message::ChatMessage;
pub use room::Room;
pub use user::{CreateUser, User};
