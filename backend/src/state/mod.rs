//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::escrow::EscrowSyncService;
use crate::websocket::WsState;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sync_service: Arc<EscrowSyncService>,
    pub ws_state: WsState,
}

impl AppState {
    pub fn new(sync_service: Arc<EscrowSyncService>, ws_state: WsState) -> Self {
        Self {
            sync_service,
            ws_state,
        }
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}

impl FromRef<AppState> for Arc<EscrowSyncService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.sync_service.clone()
    }
}
