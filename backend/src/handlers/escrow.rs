//! Escrow-related API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::escrow::{DepositEscrowRequest, Escrow, InitiateEscrowRequest};
use crate::models::ApiResponse;
use crate::state::AppState;

/// List all escrows, most recently updated first
pub async fn list_escrows(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<Vec<Escrow>>> {
    let escrows = app_state.sync_service.escrows().await;
    Json(ApiResponse::ok(escrows))
}

/// Fetch a single escrow by id
pub async fn get_escrow(
    State(app_state): State<AppState>,
    Path(escrow_id): Path<u64>,
) -> ApiResult<Json<ApiResponse<Escrow>>> {
    let escrow = app_state
        .sync_service
        .escrow_by_id(escrow_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("escrow {} not found", escrow_id)))?;
    Ok(Json(ApiResponse::ok(escrow)))
}

/// Force a full snapshot refresh from the ledger
pub async fn refresh(
    State(app_state): State<AppState>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    app_state.sync_service.refresh_snapshot().await?;
    Ok(Json(ApiResponse::ok(json!({ "refreshed": true }))))
}

/// Open a new escrow between a seller and a buyer
pub async fn initiate_escrow(
    State(app_state): State<AppState>,
    Json(request): Json<InitiateEscrowRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let escrow_id = app_state.sync_service.initiate_escrow(&request).await?;
    Ok(Json(ApiResponse::ok(json!({ "escrow_id": escrow_id }))))
}

/// Deposit the agreed amount into an escrow
pub async fn deposit_escrow(
    State(app_state): State<AppState>,
    Path(escrow_id): Path<u64>,
    Json(request): Json<DepositEscrowRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    app_state
        .sync_service
        .deposit_escrow(escrow_id, &request)
        .await?;
    Ok(Json(ApiResponse::ok(json!({ "escrow_id": escrow_id }))))
}

/// Approve a deposited escrow, releasing funds to the seller
pub async fn approve_escrow(
    State(app_state): State<AppState>,
    Path(escrow_id): Path<u64>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    app_state.sync_service.approve_escrow(escrow_id).await?;
    Ok(Json(ApiResponse::ok(json!({ "escrow_id": escrow_id }))))
}

/// Reject a deposited escrow, refunding the buyer in full
pub async fn reject_escrow(
    State(app_state): State<AppState>,
    Path(escrow_id): Path<u64>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    app_state.sync_service.reject_escrow(escrow_id).await?;
    Ok(Json(ApiResponse::ok(json!({ "escrow_id": escrow_id }))))
}

/// Archive an escrow that never received a deposit
pub async fn archive_escrow(
    State(app_state): State<AppState>,
    Path(escrow_id): Path<u64>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    app_state.sync_service.archive_escrow(escrow_id).await?;
    Ok(Json(ApiResponse::ok(json!({ "escrow_id": escrow_id }))))
}
