use super::ingest::{
    handle_ingest_actions, handle_ingest_logs, handle_ingest_network, handle_ingest_vitals,
    handle_ingest_websocket,
};
use super::mcp::{handle_mcp, handle_mcp_get};
use super::query::{
    handle_command_result, handle_extension_logs, handle_health, handle_ingest_health,
    handle_query_actions, handle_query_logs, handle_query_network, handle_query_vitals,
    handle_query_websocket, handle_websocket_status,
};
use super::sync::handle_sync;
use super::AppState;

use crate::config::GatewayConfig;
use crate::daemon::Daemon;
use anyhow::{Context, Result};
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

const CLIENT_HEADER_LOWER: &str = "x-gasoline-client";

/// Returns true when the bind address is not a loopback address.
pub fn is_public_bind(host: &str) -> bool {
    !matches!(
        host,
        "127.0.0.1" | "localhost" | "::1" | "[::1]" | "0:0:0:0:0:0:0:1"
    )
}

/// Bind `host:port` and serve until `shutdown` fires.
pub async fn run_gateway(
    host: &str,
    port: u16,
    daemon: Arc<Daemon>,
    shutdown: CancellationToken,
) -> Result<()> {
    if is_public_bind(host) && !daemon.config().gateway.allow_public_bind {
        anyhow::bail!(
            "Refusing to bind to {host}: captured browser data would be reachable from the network.\n\
             Fix: use --host 127.0.0.1 (default), or set\n\
             [gateway] allow_public_bind = true in config.toml (NOT recommended)."
        );
    }

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("bind gateway socket on {host}:{port}"))?;

    run_gateway_with_listener(listener, daemon, shutdown).await
}

/// Serve from a pre-bound listener.
pub async fn run_gateway_with_listener(
    listener: tokio::net::TcpListener,
    daemon: Arc<Daemon>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .context("get gateway listener local address")?;
    tracing::info!(%addr, "gateway listening");

    let app = build_app(AppState::new(daemon));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("serve HTTP gateway")?;

    tracing::info!(%addr, "gateway stopped");
    Ok(())
}

pub fn build_app(state: AppState) -> Router {
    let gateway: GatewayConfig = state.daemon.config().gateway.clone();

    let telemetry = Router::new()
        .route("/health", get(handle_health))
        .route("/v4/health", get(handle_ingest_health))
        .route("/sync", post(handle_sync))
        .route("/command-result", post(handle_command_result))
        .route("/logs", get(handle_query_logs).post(handle_ingest_logs))
        .route(
            "/network-bodies",
            get(handle_query_network).post(handle_ingest_network),
        )
        .route(
            "/websocket-events",
            get(handle_query_websocket).post(handle_ingest_websocket),
        )
        .route("/websocket-status", get(handle_websocket_status))
        .route(
            "/enhanced-actions",
            get(handle_query_actions).post(handle_ingest_actions),
        )
        .route("/vitals", get(handle_query_vitals).post(handle_ingest_vitals))
        .route("/extension-logs", get(handle_extension_logs))
        .layer(RequestBodyLimitLayer::new(gateway.max_body_bytes));

    // `/mcp` enforces the same limit itself and answers in JSON-RPC.
    let mut app = Router::new()
        .merge(telemetry)
        .route("/mcp", post(handle_mcp).get(handle_mcp_get))
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(gateway.request_timeout_secs),
        ));

    if !gateway.cors_origins.is_empty() {
        let origins: Vec<HeaderValue> = gateway
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([
                    header::CONTENT_TYPE,
                    HeaderName::from_static(CLIENT_HEADER_LOWER),
                ]),
        );
    }
    app
}
