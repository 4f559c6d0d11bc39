//! Agent administration handlers

use axum::{extract::State, Json};
use serde_json::json;

use crate::error::ApiResult;
use crate::escrow::{AgentStateResponse, ChangeAgentRequest, ChangeFeeRequest};
use crate::models::ApiResponse;
use crate::state::AppState;

/// Current agent address, fee percentage, fee pool and busy flag
pub async fn get_agent_state(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<AgentStateResponse>> {
    let state = app_state.sync_service.agent_state().await;
    Json(ApiResponse::ok(state))
}

/// Hand the agent role to a different account
pub async fn change_agent(
    State(app_state): State<AppState>,
    Json(request): Json<ChangeAgentRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    app_state.sync_service.change_agent(&request).await?;
    Ok(Json(ApiResponse::ok(json!({ "agent": request.new_agent }))))
}

/// Change the fee percentage applied to future escrows
pub async fn change_fee(
    State(app_state): State<AppState>,
    Json(request): Json<ChangeFeeRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    app_state
        .sync_service
        .change_agent_fee_percentage(&request)
        .await?;
    Ok(Json(ApiResponse::ok(json!({ "fee": request.new_fee }))))
}

/// Drain the accumulated fee pool to the agent
pub async fn withdraw_funds(
    State(app_state): State<AppState>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    app_state.sync_service.withdraw_funds().await?;
    Ok(Json(ApiResponse::ok(json!({ "withdrawn": true }))))
}
