//! `POST` ingest endpoints fed by the browser extension.

use super::{AppState, error_response};
use crate::capture::{
    CaptureStore, EnhancedAction, LogEntry, NetworkBody, VitalsSnapshot, WebSocketEvent,
};
use crate::security::Admission;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub(super) struct LogsBatch {
    entries: Vec<LogEntry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct NetworkBatch {
    bodies: Vec<NetworkBody>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WebSocketBatch {
    events: Vec<WebSocketEvent>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ActionsBatch {
    actions: Vec<EnhancedAction>,
}

#[derive(Debug, Deserialize)]
pub(super) struct VitalsBatch {
    vitals: Vec<VitalsSnapshot>,
}

pub(super) fn invalid_json(rejection: &JsonRejection) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "invalid_json",
        rejection.body_text(),
    )
    .into_response()
}

/// Admit a batch through the circuit breaker, then append it.
fn ingest<T>(
    state: &AppState,
    buffer: &'static str,
    records: Vec<T>,
    append: fn(&CaptureStore, Vec<T>) -> u64,
) -> Response {
    let count = records.len();
    if let Admission::Deny(denial) = state.daemon.admit_ingest(count) {
        tracing::warn!(
            buffer,
            count,
            circuit_open = denial.circuit_open,
            rate = denial.current_rate,
            "ingest batch rejected"
        );
        let retry_after_secs = denial.retry_after_ms.div_ceil(1000).max(1);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_secs.to_string())],
            Json(denial),
        )
            .into_response();
    }

    let last_sequence = append(&state.daemon.capture, records);
    tracing::debug!(buffer, count, last_sequence, "ingest batch stored");
    (
        StatusCode::OK,
        Json(json!({ "received": count, "last_sequence": last_sequence })),
    )
        .into_response()
}

/// POST /logs
pub(super) async fn handle_ingest_logs(
    State(state): State<AppState>,
    body: Result<Json<LogsBatch>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(batch)) => ingest(&state, "logs", batch.entries, CaptureStore::add_logs),
        Err(e) => invalid_json(&e),
    }
}

/// POST /network-bodies
pub(super) async fn handle_ingest_network(
    State(state): State<AppState>,
    body: Result<Json<NetworkBatch>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(batch)) => ingest(
            &state,
            "network",
            batch.bodies,
            CaptureStore::add_network_bodies,
        ),
        Err(e) => invalid_json(&e),
    }
}

/// POST /websocket-events
pub(super) async fn handle_ingest_websocket(
    State(state): State<AppState>,
    body: Result<Json<WebSocketBatch>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(batch)) => ingest(
            &state,
            "websocket",
            batch.events,
            CaptureStore::add_websocket_events,
        ),
        Err(e) => invalid_json(&e),
    }
}

/// POST /enhanced-actions
pub(super) async fn handle_ingest_actions(
    State(state): State<AppState>,
    body: Result<Json<ActionsBatch>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(batch)) => ingest(&state, "actions", batch.actions, CaptureStore::add_actions),
        Err(e) => invalid_json(&e),
    }
}

/// POST /vitals
pub(super) async fn handle_ingest_vitals(
    State(state): State<AppState>,
    body: Result<Json<VitalsBatch>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(batch)) => ingest(&state, "vitals", batch.vitals, CaptureStore::add_vitals),
        Err(e) => invalid_json(&e),
    }
}
