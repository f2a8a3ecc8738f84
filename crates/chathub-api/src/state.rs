//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use chathub_auth::{JwtDecoder, JwtEncoder, PasswordHasher, PasswordValidator};
use chathub_core::config::AppConfig;
use chathub_database::DatabasePool;
use chathub_database::repositories::UserRepository;
use chathub_realtime::ChatEngine;

use crate::middleware::rate_limit::RateLimiter;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// Application configuration
    pub config: Arc<AppConfig>,

    // ── Infrastructure ───────────────────────────────────────
    /// PostgreSQL connection pool
    pub db: DatabasePool,

    // ── Auth ─────────────────────────────────────────────────
    /// JWT token encoder
    pub jwt_encoder: Arc<JwtEncoder>,
    /// JWT token decoder and validator
    pub jwt_decoder: Arc<JwtDecoder>,
    /// Password hasher (Argon2)
    pub password_hasher: Arc<PasswordHasher>,
    /// Registration password policy
    pub password_validator: Arc<PasswordValidator>,

    // ── Chat ─────────────────────────────────────────────────
    /// Room registry, broadcasters and persistence pool
    pub engine: ChatEngine,
    /// User repository
    pub user_repo: Arc<UserRepository>,

    // ── Middleware ───────────────────────────────────────────
    /// Per-client token buckets
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Wire the auth components from configuration around an engine.
    pub fn new(config: AppConfig, db: DatabasePool, engine: ChatEngine) -> Self {
        let rate_limiter = RateLimiter::new(
            config.rate_limit.burst,
            config.rate_limit.requests_per_second,
        );
        Self {
            jwt_encoder: Arc::new(JwtEncoder::new(&config.auth)),
            jwt_decoder: Arc::new(JwtDecoder::new(&config.auth)),
            password_hasher: Arc::new(PasswordHasher::new()),
            password_validator: Arc::new(PasswordValidator::new(&config.auth)),
            user_repo: Arc::new(UserRepository::new(db.pool().clone())),
            config: Arc::new(config),
            db,
            engine,
            rate_limiter,
        }
    }
}
