//! Escrow route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::escrow::*;
use crate::state::AppState;

pub fn escrow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/escrows", get(list_escrows))
        .route("/api/escrows", post(initiate_escrow))
        .route("/api/escrows/refresh", post(refresh))
        .route("/api/escrows/:id", get(get_escrow))
        .route("/api/escrows/:id/deposit", post(deposit_escrow))
        .route("/api/escrows/:id/approve", post(approve_escrow))
        .route("/api/escrows/:id/reject", post(reject_escrow))
        .route("/api/escrows/:id/archive", post(archive_escrow))
}
