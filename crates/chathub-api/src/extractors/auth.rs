//! `AuthUser` extractor: pulls the JWT from the request, validates it and
//! injects the caller's identity.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

use chathub_core::error::AppError;
use chathub_core::types::UserId;
use chathub_realtime::ChatIdentity;

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// User id from the token subject.
    pub user_id: UserId,
    /// Username claim.
    pub username: String,
}

impl AuthUser {
    /// Identity handed to the chat engine.
    pub fn identity(&self) -> ChatIdentity {
        ChatIdentity {
            user_id: self.user_id,
            username: self.username.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| query_token(parts))
            .ok_or_else(|| AppError::authentication("Missing access token"))?;

        let claims = state.jwt_decoder.decode(&token)?;

        Ok(AuthUser {
            user_id: claims.user_id(),
            username: claims.username,
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

/// Browsers cannot set headers on a WebSocket handshake, so `?token=` is
/// accepted as well.
fn query_token(parts: &Parts) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|q| q.0.token)
        .filter(|t| !t.is_empty())
}
