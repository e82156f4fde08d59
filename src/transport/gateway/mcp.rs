//! `POST /mcp`: JSON-RPC over HTTP.

use super::{AppState, CLIENT_HEADER, DEFAULT_CLIENT_ID, error_response};
use crate::error::ProtocolError;
use crate::mcp::JsonRpcResponse;
use axum::{
    Json,
    body::{Body, to_bytes},
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;

fn content_type_allowed(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_none_or(|ct| ct.trim().to_ascii_lowercase().starts_with("application/json"))
}

pub(super) fn client_id(headers: &HeaderMap) -> &str {
    headers
        .get(CLIENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_CLIENT_ID)
}

/// POST /mcp
///
/// The body is read here rather than behind the router-wide limit so that an
/// oversized or broken body still gets a JSON-RPC answer.
pub(super) async fn handle_mcp(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if !content_type_allowed(&headers) {
        return error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_media_type",
            "Content-Type must be application/json",
        )
        .into_response();
    }

    let limit = state.daemon.config().gateway.max_body_bytes;
    let body = match to_bytes(body, limit).await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(limit, error = %e, "MCP request body could not be read");
            let error = ProtocolError::Parse(format!("Read error: {e}"));
            return (StatusCode::OK, Json(JsonRpcResponse::failure(Value::Null, &error)))
                .into_response();
        }
    };

    match state.mcp.handle_bytes(&body, client_id(&headers)).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// GET /mcp: server-push streams are not offered.
pub(super) async fn handle_mcp_get() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(serde_json::json!({
            "error": "method_not_allowed",
            "message": "POST JSON-RPC requests to /mcp",
        })),
    )
        .into_response()
}
