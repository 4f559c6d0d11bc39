//! Escrow Agent Backend Server
//!
//! Mirrors the on-chain escrow contract into an in-memory read model,
//! serves it over HTTP and WebSocket, and relays writes through the
//! signing gateway.

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use escrow_agent_server::config::Config;
use escrow_agent_server::escrow::{event_listener, EscrowSyncService, EventListener};
use escrow_agent_server::handlers;
use escrow_agent_server::ledger::RpcLedgerProvider;
use escrow_agent_server::middleware;
use escrow_agent_server::routes;
use escrow_agent_server::state::AppState;
use escrow_agent_server::websocket;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "starting up");

    // Ledger access goes through the signing gateway
    let provider = Arc::new(RpcLedgerProvider::new(
        config.signing_gateway_url.clone(),
        config.contract_id.clone(),
        config.network_passphrase.clone(),
    ));
    let sync_service = Arc::new(EscrowSyncService::new(provider));

    // Take the initial snapshot. A gateway outage at boot is not fatal;
    // the periodic refresher retries until it succeeds.
    if let Err(e) = sync_service.connect().await {
        tracing::warn!("initial ledger sync failed, starting with empty model: {}", e);
    }

    // Initialize WebSocket state
    let ws_state = websocket::WsState::new();

    // Start event listener in background
    let listener = EventListener::new(
        config.soroban_rpc_url.clone(),
        config.contract_id.clone(),
        Duration::from_secs(config.event_poll_secs),
        sync_service.clone(),
        ws_state.clone(),
    );
    tokio::spawn(listener.start());

    // Periodic snapshot refresh heals any missed events
    tokio::spawn(event_listener::snapshot_refresher(
        sync_service.clone(),
        Duration::from_secs(config.snapshot_refresh_secs),
    ));

    let app_state = AppState::new(sync_service, ws_state);

    // Create the app router
    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/ws", get(websocket::ws_handler))
        .merge(routes::escrow_routes())
        .merge(routes::admin_routes())
        .with_state(app_state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(TraceLayer::new_for_http())
        .layer(configure_cors(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("WebSocket available at ws://{}/ws", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Serve with graceful shutdown
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {}", e);
    }

    tracing::info!("Server shutdown complete");
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let allowed_origins = allowed_origins.unwrap_or_default();

    if allowed_origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
