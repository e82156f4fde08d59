//! Axum HTTP surface: browser-extension ingest and sync, snapshot queries,
//! health, and the `/mcp` JSON-RPC endpoint.
//!
//! Body size and request time are bounded by tower layers configured from
//! `[gateway]`; ingest admission goes through the daemon's circuit breaker.

mod ingest;
mod mcp;
mod query;
mod server;
mod sync;

pub use server::{build_app, is_public_bind, run_gateway, run_gateway_with_listener};

use crate::daemon::Daemon;
use crate::mcp::McpHandler;
use axum::Json;
use axum::http::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;

/// Header carrying the MCP client identity.
pub const CLIENT_HEADER: &str = "X-Gasoline-Client";
/// Client id used when the header is absent.
pub const DEFAULT_CLIENT_ID: &str = "unknown";

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub daemon: Arc<Daemon>,
    pub mcp: Arc<McpHandler>,
}

impl AppState {
    pub fn new(daemon: Arc<Daemon>) -> Self {
        Self {
            mcp: Arc::new(McpHandler::new(Arc::clone(&daemon))),
            daemon,
        }
    }
}

type JsonResponse = (StatusCode, Json<Value>);

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> JsonResponse {
    (
        status,
        Json(json!({ "error": error, "message": message.into() })),
    )
}
