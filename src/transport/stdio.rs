//! Newline-delimited JSON-RPC over stdio.
//!
//! The bridge forwards each line to a daemon already listening on the
//! configured port, or hosts one in-process when none answers `/health`.

use super::gateway::{CLIENT_HEADER, run_gateway};
use crate::config::Config;
use crate::daemon::{Daemon, SERVER_NAME, join_task};
use crate::diagnostics::lifecycle::{LifecycleEvent, LifecycleLog};
use crate::error::{ProtocolError, TransportError};
use crate::mcp::jsonrpc::{Decoded, decode};
use crate::mcp::{JsonRpcResponse, McpHandler};
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_millis(500);
const FORWARD_TIMEOUT: Duration = Duration::from_secs(60);

// ─── Upstream forwarding ─────────────────────────────────────────────────────

/// HTTP client for a daemon that is already running.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
}

impl Forwarder {
    pub fn new(base_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// True when a gasoline daemon answers `GET /health`.
    pub async fn is_healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        let response = match self.client.get(&url).timeout(HEALTH_CHECK_TIMEOUT).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!(%url, status = %response.status(), "health check rejected");
                return false;
            }
            Err(e) => {
                tracing::debug!(%url, error = %e, "no daemon answering");
                return false;
            }
        };
        response
            .json::<Value>()
            .await
            .is_ok_and(|body| body.get("service").and_then(Value::as_str) == Some(SERVER_NAME))
    }

    /// POST one raw frame to `/mcp`.
    pub async fn forward(&self, frame: &[u8]) -> Result<Option<JsonRpcResponse>, TransportError> {
        let url = format!("{}/mcp", self.base_url);
        let bridge_error = |message: String| TransportError::Bridge {
            url: url.clone(),
            message,
        };

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(CLIENT_HEADER, &self.client_id)
            .timeout(FORWARD_TIMEOUT)
            .body(frame.to_vec())
            .send()
            .await
            .map_err(|e| bridge_error(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(bridge_error(format!("HTTP {status}")));
        }
        response
            .json::<JsonRpcResponse>()
            .await
            .map(Some)
            .map_err(|e| bridge_error(e.to_string()))
    }
}

// ─── Backends ────────────────────────────────────────────────────────────────

/// Where stdio frames are answered.
#[derive(Debug, Clone)]
pub enum Backend {
    Local {
        handler: Arc<McpHandler>,
        client_id: String,
    },
    Remote(Forwarder),
}

impl Backend {
    async fn answer(&self, frame: &[u8]) -> Option<JsonRpcResponse> {
        match self {
            Self::Local { handler, client_id } => handler.handle_bytes(frame, client_id).await,
            Self::Remote(forwarder) => match forwarder.forward(frame).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, "forwarding to daemon failed");
                    upstream_failure(frame, &e)
                }
            },
        }
    }

    fn mode(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Remote(_) => "forward",
        }
    }
}

/// JSON-RPC error for a frame the upstream daemon could not answer.
/// Notifications stay silent.
fn upstream_failure(frame: &[u8], err: &TransportError) -> Option<JsonRpcResponse> {
    match decode(frame) {
        Decoded::Request(request) => request.id.map(|id| {
            JsonRpcResponse::failure(id, &ProtocolError::Internal(err.to_string()))
        }),
        Decoded::Reject(response) => Some(response),
        Decoded::Ignore => None,
    }
}

// ─── Line loop ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub frames: u64,
    pub responses: u64,
}

/// Answer frames from `reader` until EOF, one response line per request.
pub async fn serve_lines<R, W>(reader: R, writer: &mut W, backend: &Backend) -> Result<BridgeStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = BridgeStats::default();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("read stdin")? {
        let frame = line.trim();
        if frame.is_empty() {
            continue;
        }
        stats.frames += 1;

        let Some(response) = backend.answer(frame.as_bytes()).await else {
            continue;
        };
        let mut encoded = serde_json::to_vec(&response).context("encode response")?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await.context("write response")?;
        writer.flush().await.context("flush response")?;
        stats.responses += 1;
    }
    Ok(stats)
}

/// Where anything written to fd 1 outside the protocol ends up.
pub fn stray_output_path(config: &Config) -> PathBuf {
    config.state_dir_path().join("logs").join("stdio-stray.log")
}

/// Take fd 1 over for the protocol.
///
/// The returned file is a close-on-exec duplicate of the original stdout.
/// fd 1 itself is pointed at `stray` (or `/dev/null`), so prints from any
/// crate and output of child processes never reach the client.
#[cfg(unix)]
pub fn isolate_stdout(stray: &std::path::Path) -> Result<std::fs::File> {
    use std::io::Write;
    use std::os::fd::AsFd;

    let stdout = std::io::stdout();
    stdout.lock().flush().context("flush stdout")?;
    let protocol = stdout
        .as_fd()
        .try_clone_to_owned()
        .context("duplicate stdout")?;

    match open_stray_sink(stray) {
        Some(sink) => rustix::stdio::dup2_stdout(&sink).context("redirect stdout")?,
        None => tracing::warn!(
            path = %stray.display(),
            "no sink for stray output; stdout left attached to the client"
        ),
    }
    Ok(std::fs::File::from(protocol))
}

#[cfg(unix)]
fn open_stray_sink(path: &std::path::Path) -> Option<std::fs::File> {
    let opened = path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|()| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
        });
    match opened {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "stray log unavailable; using /dev/null");
            std::fs::OpenOptions::new().write(true).open("/dev/null").ok()
        }
    }
}

#[cfg(unix)]
fn protocol_stdout(config: &Config) -> Result<tokio::fs::File> {
    let file = isolate_stdout(&stray_output_path(config))?;
    Ok(tokio::fs::File::from_std(file))
}

#[cfg(not(unix))]
fn protocol_stdout(_config: &Config) -> Result<tokio::io::Stdout> {
    Ok(tokio::io::stdout())
}

// ─── Entry point ─────────────────────────────────────────────────────────────

/// Run the stdio bridge until stdin closes.
pub async fn run_stdio(config: Config, client_id: String) -> Result<()> {
    let mut out = protocol_stdout(&config)?;
    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    let forwarder = Forwarder::new(format!("http://{host}:{port}"), client_id.clone());

    let cancel = CancellationToken::new();
    let mut local: Option<Arc<Daemon>> = None;
    let mut tasks = Vec::new();

    let backend = if forwarder.is_healthy().await {
        tracing::info!(upstream = forwarder.base_url(), client = %client_id, "forwarding to running daemon");
        Backend::Remote(forwarder)
    } else {
        let daemon = Arc::new(Daemon::new(config.clone()));
        daemon.check_state_dir();
        tasks.push(("reaper", daemon.spawn_background(cancel.clone())));

        let gateway_daemon = Arc::clone(&daemon);
        let gateway_cancel = cancel.clone();
        tasks.push((
            "gateway",
            tokio::spawn(async move {
                if let Err(e) = run_gateway(&host, port, gateway_daemon, gateway_cancel).await {
                    tracing::warn!(error = %e, "in-process gateway unavailable; extension cannot connect");
                }
            }),
        ));
        tracing::info!(port, client = %client_id, "no daemon running; serving in-process");

        local = Some(Arc::clone(&daemon));
        Backend::Local {
            handler: Arc::new(McpHandler::new(daemon)),
            client_id,
        }
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let outcome = serve_lines(stdin, &mut out, &backend).await;

    cancel.cancel();
    for (name, task) in tasks {
        join_task(name, task).await;
    }

    let stats = outcome.as_ref().copied().unwrap_or_default();
    let mut extra = json!({
        "mode": backend.mode(),
        "frames": stats.frames,
        "responses": stats.responses,
    });
    match &local {
        Some(daemon) => {
            extra["stats"] = daemon.shutdown_stats();
            daemon.record_lifecycle(LifecycleEvent::BridgeExit, extra);
        }
        None => {
            LifecycleLog::from_config(&config).record(LifecycleEvent::BridgeExit, extra);
        }
    }
    tracing::info!(frames = stats.frames, "stdio bridge exiting");

    outcome.map(|_| ())
}
