//! Health check handler.

use std::time::Duration;

use axum::Json;
use axum::extract::State;

use crate::dto::response::{ApiResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let db_ok = matches!(
        tokio::time::timeout(Duration::from_secs(2), state.db.health_check()).await,
        Ok(Ok(true))
    );

    Json(ApiResponse::ok(HealthResponse {
        status: if db_ok { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if db_ok { "connected" } else { "unavailable" }.to_string(),
        open_rooms: state.engine.registry().open_count().await,
        realtime: state.engine.metrics(),
        persistence: state.engine.persistence_stats(),
    }))
}
