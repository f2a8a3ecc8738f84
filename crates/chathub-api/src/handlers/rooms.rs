//! Room handlers: create, list, reopen, close and history.

use std::collections::HashSet;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use chathub_core::types::RoomId;
use chathub_realtime::RoomDescriptor;

use crate::dto::request::{CreateRoomRequest, HistoryQuery, validate_request};
use crate::dto::response::{ApiResponse, CloseRoomResponse, MessageResponse, RoomResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /api/rooms
pub async fn create_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RoomDescriptor>>), ApiError> {
    validate_request(&req)?;
    let room = state.engine.open_room(&req.name).await?;
    tracing::info!(room_id = %room.id, user_id = %auth.user_id, "Room created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(room))))
}

/// GET /api/rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<RoomResponse>>>, ApiError> {
    let open: HashSet<RoomId> = state
        .engine
        .list_open_rooms()
        .await
        .into_iter()
        .map(|r| r.id)
        .collect();
    let rooms = state
        .engine
        .list_rooms()
        .await?
        .into_iter()
        .map(|room| {
            let is_open = open.contains(&room.id);
            RoomResponse::new(room, is_open)
        })
        .collect();
    Ok(Json(ApiResponse::ok(rooms)))
}

/// GET /api/rooms/open
pub async fn list_open_rooms(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Json<ApiResponse<Vec<RoomDescriptor>>> {
    Json(ApiResponse::ok(state.engine.list_open_rooms().await))
}

/// POST /api/rooms/{room_id}/open
pub async fn reopen_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<RoomId>,
) -> Result<Json<ApiResponse<RoomDescriptor>>, ApiError> {
    let room = state.engine.reopen_room(room_id).await?;
    tracing::info!(room_id = %room.id, user_id = %auth.user_id, "Room reopened");
    Ok(Json(ApiResponse::ok(room)))
}

/// DELETE /api/rooms/{room_id}/live
pub async fn close_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<RoomId>,
) -> Json<ApiResponse<CloseRoomResponse>> {
    let outcome = state.engine.close_room(room_id).await;
    tracing::info!(room_id = %room_id, user_id = %auth.user_id, outcome = ?outcome, "Room close requested");
    Json(ApiResponse::ok(CloseRoomResponse { room_id, outcome }))
}

/// GET /api/rooms/{room_id}/messages?limit=N
pub async fn recent_messages(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(room_id): Path<RoomId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<MessageResponse>>>, ApiError> {
    let messages = state
        .engine
        .recent_messages(room_id, query.limit)
        .await?
        .into_iter()
        .map(MessageResponse::from)
        .collect();
    Ok(Json(ApiResponse::ok(messages)))
}
