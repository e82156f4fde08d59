//! Snapshot queries, health and command-result delivery.

use super::ingest::invalid_json;
use super::{AppState, JsonResponse, error_response};
use crate::capture::{
    ActionFilter, LogFilter, NetworkFilter, Page, PageRequest, Pagination, WebSocketFilter,
};
use crate::diagnostics::health::{ingest_health, liveness};
use crate::error::CaptureError;
use crate::pending::Outcome;
use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

fn cursor_error(err: &CaptureError) -> JsonResponse {
    match err {
        CaptureError::CursorExpired { .. } => {
            let mut response = error_response(StatusCode::GONE, "cursor_expired", err.to_string());
            response.1.0["lost_entries"] = json!(err.lost_entries());
            response
        }
        CaptureError::InvalidCursor(_) | CaptureError::UnknownBuffer(_) => {
            error_response(StatusCode::BAD_REQUEST, "invalid_cursor", err.to_string())
        }
    }
}

fn page_response<T: Serialize>(page: Result<Page<T>, CaptureError>) -> JsonResponse {
    match page {
        Ok(page) => (
            StatusCode::OK,
            Json(json!({ "entries": page.entries, "metadata": page.meta })),
        ),
        Err(e) => cursor_error(&e),
    }
}

fn request(pagination: &Pagination) -> Result<PageRequest, JsonResponse> {
    pagination.to_request().map_err(|e| cursor_error(&e))
}

/// GET /logs
pub(super) async fn handle_query_logs(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<LogFilter>,
) -> JsonResponse {
    match request(&pagination) {
        Ok(request) => page_response(state.daemon.capture.read_logs(&request, &filter)),
        Err(response) => response,
    }
}

/// GET /network-bodies
pub(super) async fn handle_query_network(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<NetworkFilter>,
) -> JsonResponse {
    match request(&pagination) {
        Ok(request) => page_response(state.daemon.capture.read_network(&request, &filter)),
        Err(response) => response,
    }
}

/// GET /websocket-events
pub(super) async fn handle_query_websocket(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<WebSocketFilter>,
) -> JsonResponse {
    match request(&pagination) {
        Ok(request) => page_response(state.daemon.capture.read_websocket(&request, &filter)),
        Err(response) => response,
    }
}

/// GET /enhanced-actions
pub(super) async fn handle_query_actions(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<ActionFilter>,
) -> JsonResponse {
    match request(&pagination) {
        Ok(request) => page_response(state.daemon.capture.read_actions(&request, &filter)),
        Err(response) => response,
    }
}

/// GET /vitals
pub(super) async fn handle_query_vitals(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> JsonResponse {
    match request(&pagination) {
        Ok(request) => page_response(state.daemon.capture.read_vitals(&request)),
        Err(response) => response,
    }
}

/// GET /extension-logs
pub(super) async fn handle_extension_logs(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> JsonResponse {
    match request(&pagination) {
        Ok(request) => page_response(state.daemon.capture.read_extension_logs(&request)),
        Err(response) => response,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct WebSocketStatusQuery {
    url: Option<String>,
    connection_id: Option<String>,
}

/// GET /websocket-status
pub(super) async fn handle_websocket_status(
    State(state): State<AppState>,
    Query(query): Query<WebSocketStatusQuery>,
) -> JsonResponse {
    let status = state
        .daemon
        .capture
        .websocket_status(query.url.as_deref(), query.connection_id.as_deref());
    (StatusCode::OK, Json(json!(status)))
}

/// GET /health
pub(super) async fn handle_health(State(state): State<AppState>) -> JsonResponse {
    (StatusCode::OK, Json(json!(liveness(&state.daemon))))
}

/// GET /v4/health
pub(super) async fn handle_ingest_health(State(state): State<AppState>) -> JsonResponse {
    (StatusCode::OK, Json(json!(ingest_health(&state.daemon))))
}

/// One command outcome reported by the extension, standalone or inside `/sync`.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct CommandResultBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default, alias = "status")]
    pub outcome: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Why a reported result could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum DeliveryError {
    MissingId,
    BadOutcome(String),
    Unknown(String),
}

impl CommandResultBody {
    /// Apply this result to the pending registry.
    pub(super) fn deliver(self, state: &AppState) -> Result<String, DeliveryError> {
        let id = self
            .correlation_id
            .or(self.id)
            .filter(|id| !id.is_empty())
            .ok_or(DeliveryError::MissingId)?;
        let outcome = match self.outcome.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw
                .parse::<Outcome>()
                .map_err(|_| DeliveryError::BadOutcome(raw.to_string()))?,
            _ if self.error.is_some() => Outcome::Error,
            _ => Outcome::Complete,
        };

        if state.daemon.pending.deliver(&id, outcome, self.result, self.error) {
            tracing::debug!(correlation_id = %id, %outcome, "command result delivered");
            Ok(id)
        } else {
            tracing::debug!(correlation_id = %id, "command result for unknown or settled command");
            Err(DeliveryError::Unknown(id))
        }
    }
}

/// POST /command-result
pub(super) async fn handle_command_result(
    State(state): State<AppState>,
    body: Result<Json<CommandResultBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return invalid_json(&e),
    };
    let response = match body.deliver(&state) {
        Ok(id) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "correlation_id": id })),
        ),
        Err(DeliveryError::MissingId) => error_response(
            StatusCode::BAD_REQUEST,
            "missing_param",
            "correlation_id (or id) is required",
        ),
        Err(DeliveryError::BadOutcome(raw)) => error_response(
            StatusCode::BAD_REQUEST,
            "invalid_param",
            format!("unknown outcome '{raw}'; expected complete, error or timeout"),
        ),
        Err(DeliveryError::Unknown(id)) => error_response(
            StatusCode::NOT_FOUND,
            "no_data",
            format!("no pending command {id}"),
        ),
    };
    response.into_response()
}
