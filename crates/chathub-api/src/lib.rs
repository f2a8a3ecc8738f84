//! # chathub-api
//!
//! HTTP API layer for ChatHub built on Axum.
//!
//! Provides the REST endpoints for accounts and rooms, the WebSocket
//! upgrade into the chat engine, middleware (rate limiting, CORS),
//! extractors, DTOs, and error mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::serve;
pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
