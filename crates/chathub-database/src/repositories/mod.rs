//! Concrete PostgreSQL repositories.

pub mod message;
pub mod room;
pub mod user;

pub use message::MessageRepository;
pub use room::RoomRepository;
pub use user::UserRepository;
