//! Auth handlers: register and login.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use chathub_core::error::AppError;
use chathub_entity::CreateUser;

use crate::dto::request::{LoginRequest, RegisterRequest, validate_request};
use crate::dto::response::{ApiResponse, LoginResponse, UserResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    validate_request(&req)?;
    state.password_validator.validate(&req.password)?;

    let password_hash = state.password_hasher.hash_password(&req.password)?;
    let user = state
        .user_repo
        .create(&CreateUser {
            username: req.username.trim().to_string(),
            email: req.email.trim().to_lowercase(),
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(user.into()))))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    validate_request(&req)?;

    // Same error for unknown email and wrong password.
    let invalid = || AppError::authentication("Invalid email or password");

    let user = state
        .user_repo
        .find_by_email(req.email.trim())
        .await?
        .ok_or_else(invalid)?;
    if !state
        .password_hasher
        .verify_password(&req.password, &user.password_hash)?
    {
        tracing::info!(user_id = %user.id, "Login failed");
        return Err(invalid().into());
    }

    let issued = state.jwt_encoder.issue(user.id, &user.username)?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(ApiResponse::ok(LoginResponse {
        token: issued.token,
        expires_in: state.jwt_encoder.ttl_seconds(),
        user: user.into(),
    })))
}
