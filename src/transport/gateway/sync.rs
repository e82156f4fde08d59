//! `POST /sync`: the extension's single heartbeat.
//!
//! One round trip carries settings, extension logs and command results in,
//! and queued commands out.

use super::ingest::invalid_json;
use super::query::CommandResultBody;
use super::AppState;
use crate::capture::ExtensionLog;
use crate::daemon::VERSION;
use crate::diagnostics::health::server_time;
use crate::pending::PendingCommand;
use crate::tracking::ExtensionSettings;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Poll interval suggested while commands are waiting.
const BUSY_POLL_MS: u64 = 200;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SyncRequest {
    session_id: Option<String>,
    extension_version: Option<String>,
    settings: Option<ExtensionSettings>,
    extension_logs: Vec<ExtensionLog>,
    command_results: Vec<CommandResultBody>,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncCommand {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    params: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    tab_id: Option<i64>,
    correlation_id: String,
}

impl From<PendingCommand> for SyncCommand {
    fn from(command: PendingCommand) -> Self {
        Self {
            id: command.correlation_id.clone(),
            kind: command.kind,
            params: command.params,
            tab_id: command.tab_id,
            correlation_id: command.correlation_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SyncResponse {
    ack: bool,
    commands: Vec<SyncCommand>,
    next_poll_ms: u64,
    server_time: String,
    server_version: &'static str,
}

/// POST /sync
pub(super) async fn handle_sync(
    State(state): State<AppState>,
    body: Result<Json<SyncRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(e) => return invalid_json(&e),
    };
    let daemon = &state.daemon;

    daemon.tracking.record_sync(
        request.session_id.as_deref(),
        request.extension_version.as_deref(),
        request.settings.as_ref(),
    );

    if !request.extension_logs.is_empty() {
        let now = server_time();
        let logs: Vec<ExtensionLog> = request
            .extension_logs
            .into_iter()
            .map(|mut log| {
                if log.timestamp.is_empty() {
                    log.timestamp.clone_from(&now);
                }
                log
            })
            .collect();
        daemon.capture.add_extension_logs(logs);
    }

    for result in request.command_results {
        if let Err(reason) = result.deliver(&state) {
            tracing::debug!(?reason, "sync command result not applied");
        }
    }

    let commands: Vec<SyncCommand> = daemon
        .pending
        .take_undispatched()
        .into_iter()
        .map(SyncCommand::from)
        .collect();
    if !commands.is_empty() {
        tracing::debug!(count = commands.len(), "commands dispatched to extension");
    }
    let next_poll_ms = if commands.is_empty() {
        daemon.config().extension.poll_interval_ms
    } else {
        BUSY_POLL_MS
    };

    (
        StatusCode::OK,
        Json(SyncResponse {
            ack: true,
            commands,
            next_poll_ms,
            server_time: server_time(),
            server_version: VERSION,
        }),
    )
        .into_response()
}
