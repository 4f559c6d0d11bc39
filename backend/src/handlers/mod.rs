pub mod admin;
pub mod escrow;

use axum::Json;
use serde_json::json;

use crate::state::AppState;
use axum::extract::State;

/// Root endpoint
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "name": "escrow-agent-server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Health check endpoint
pub async fn health_check(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "pending": app_state.sync_service.is_pending(),
    }))
}
