use crate::capture::BufferSizes;
use crate::daemon::{Daemon, SERVER_NAME, VERSION};
use crate::pending::PendingStats;
use crate::security::{CircuitReason, CircuitSnapshot};
use crate::telemetry::TelemetryMode;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// `GET /health`: liveness only, used by the bridge to find a running daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Liveness {
    pub status: String,
    pub service: String,
    pub version: String,
    pub pid: u32,
    pub uptime_seconds: u64,
}

/// `GET /v4/health`: ingest circuit plus buffer occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct IngestHealth {
    pub circuit_open: bool,
    pub reason: Option<CircuitReason>,
    pub current_rate: u64,
    pub threshold: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<String>,
    pub buffer_sizes: BufferSizes,
    pub memory_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtensionHealth {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_at: Option<String>,
    pub pilot_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_tab_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_tab_url: Option<String>,
}

/// `configure(action:"health")`: everything an assistant needs to tell
/// whether the pipeline works end to end.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    pub status: &'static str,
    pub version: &'static str,
    pub pid: u32,
    pub started_at: String,
    pub uptime_seconds: u64,
    pub extension: ExtensionHealth,
    pub circuit: CircuitSnapshot,
    pub buffers: BufferSizes,
    pub memory_bytes: u64,
    pub pending_commands: PendingStats,
    pub telemetry_mode: TelemetryMode,
    pub tool_calls_in_window: usize,
    pub tool_call_limit: usize,
}

pub fn liveness(daemon: &Daemon) -> Liveness {
    Liveness {
        status: "ok".into(),
        service: SERVER_NAME.into(),
        version: VERSION.into(),
        pid: std::process::id(),
        uptime_seconds: daemon.uptime_seconds(),
    }
}

pub fn ingest_health(daemon: &Daemon) -> IngestHealth {
    let memory_bytes = daemon.memory_bytes();
    let circuit = daemon.circuit.snapshot(memory_bytes);
    IngestHealth {
        circuit_open: circuit.circuit_open,
        reason: circuit.reason,
        current_rate: circuit.current_rate,
        threshold: circuit.threshold,
        opened_at: circuit.opened_at,
        buffer_sizes: daemon.capture.sizes(),
        memory_bytes,
    }
}

pub fn daemon_health(daemon: &Daemon) -> DaemonHealth {
    let memory_bytes = daemon.memory_bytes();
    let circuit = daemon.circuit.snapshot(memory_bytes);
    let tracking = daemon.tracking.snapshot();
    let connected = daemon.tracking.is_connected();

    DaemonHealth {
        status: if circuit.circuit_open { "degraded" } else { "ok" },
        version: VERSION,
        pid: std::process::id(),
        started_at: daemon
            .started_at()
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        uptime_seconds: daemon.uptime_seconds(),
        extension: ExtensionHealth {
            connected,
            version: tracking.extension_version.clone(),
            last_heartbeat_at: tracking
                .last_heartbeat_at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            pilot_enabled: tracking.pilot_enabled,
            tracked_tab_id: tracking.tracked_tab_id,
            tracked_tab_url: tracking.tracked_tab_url.clone(),
        },
        circuit,
        buffers: daemon.capture.sizes(),
        memory_bytes,
        pending_commands: daemon.pending.stats(),
        telemetry_mode: daemon.telemetry.default_mode(),
        tool_calls_in_window: daemon.tool_limiter.count(),
        tool_call_limit: daemon.config().tools.max_calls,
    }
}

/// Server clock as sent to the extension.
pub fn server_time() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
