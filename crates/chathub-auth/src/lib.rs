//! # chathub-auth
//!
//! Authentication collaborator for ChatHub.
//!
//! - `jwt`: HS256 token issuance and validation. The signing secret comes
//!   from [`AuthConfig`](chathub_core::config::AuthConfig).
//! - `password`: Argon2id hashing and registration policy.

pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtDecoder, JwtEncoder};
pub use password::{PasswordHasher, PasswordValidator};
