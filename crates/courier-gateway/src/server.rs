// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the API surface.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use courier_bridge::{BridgeHandle, BridgeHealth, EventHub};
use courier_core::{CourierError, NativeStore};
use courier_store::Database;

use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Read access to the message store.
    pub db: Database,
    /// Fan-out hub; WebSocket connections subscribe here.
    pub hub: Arc<EventHub>,
    /// Command channel into the ingest engine.
    pub bridge: BridgeHandle,
    /// Native messaging adapter, used directly for outbound sends.
    pub adapter: Arc<dyn NativeStore>,
    /// Sticky store-failure flag.
    pub health: Arc<BridgeHealth>,
    /// Service-wide shutdown token.
    pub cancel: CancellationToken,
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Default and cap for history page sizes.
    pub history_page_limit: usize,
    /// Messages replayed to a fresh WebSocket subscriber.
    pub replay_backlog: usize,
    /// Ceiling for one adapter send.
    pub send_timeout_secs: f64,
}

/// Gateway server configuration (mirrors ServerConfig from courier-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Assemble the full route tree.
///
/// Split out from [`start_server`] so tests can drive the router without
/// binding a socket.
pub fn build_router(state: GatewayState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/conversations", get(handlers::get_conversations))
        .route("/messages/{sender_id}", get(handlers::get_messages))
        .route("/send", post(handlers::post_send))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(api_routes)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the gateway HTTP/WebSocket server.
///
/// Binds to the configured host:port and serves routes:
/// - GET  /health
/// - GET  /conversations
/// - GET  /messages/{sender_id}
/// - POST /send
/// - GET  /ws
///
/// Returns once the shutdown token fires and in-flight requests drain.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), CourierError> {
    let cancel = state.cancel.clone();
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| CourierError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
