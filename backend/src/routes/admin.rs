//! Agent administration route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::admin::*;
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/agent", get(get_agent_state))
        .route("/api/agent", post(change_agent))
        .route("/api/agent/fee", post(change_fee))
        .route("/api/agent/withdraw", post(withdraw_funds))
}
