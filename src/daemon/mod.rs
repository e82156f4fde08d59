//! Composition root: every stateful component lives on one [`Daemon`] that is
//! shared by the HTTP surface, the JSON-RPC handler and the tool dispatcher.

use crate::capture::{CaptureStore, NoiseRules};
use crate::config::Config;
use crate::diagnostics::audit::AuditTrail;
use crate::diagnostics::lifecycle::{LifecycleEvent, LifecycleLog};
use crate::mcp::ServerWarnings;
use crate::pending::{PendingRegistry, spawn_reaper};
use crate::security::{Admission, CircuitBreaker, ToolCallLimiter};
use crate::telemetry::DeltaTracker;
use crate::tracking::TrackingCache;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const SERVER_NAME: &str = "gasoline";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug)]
pub struct Daemon {
    config: Config,
    pub capture: CaptureStore,
    pub noise: NoiseRules,
    pub circuit: CircuitBreaker,
    pub pending: Arc<PendingRegistry>,
    pub telemetry: DeltaTracker,
    pub tracking: TrackingCache,
    pub tool_limiter: ToolCallLimiter,
    pub audit: AuditTrail,
    pub warnings: ServerWarnings,
    pub lifecycle: LifecycleLog,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self {
            capture: CaptureStore::new(&config.capture),
            noise: NoiseRules::new(),
            circuit: CircuitBreaker::new(&config.ingest),
            pending: Arc::new(PendingRegistry::new(config.pending.result_ttl())),
            telemetry: DeltaTracker::new(config.tools.telemetry_mode),
            tracking: TrackingCache::new(config.extension.heartbeat_timeout()),
            tool_limiter: ToolCallLimiter::new(config.tools.max_calls, config.tools.window()),
            audit: AuditTrail::new(config.tools.audit_capacity),
            warnings: ServerWarnings::new(),
            lifecycle: LifecycleLog::from_config(&config),
            started: Instant::now(),
            started_at: Utc::now(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Run an ingest batch of `events` through the circuit breaker.
    pub fn admit_ingest(&self, events: usize) -> Admission {
        self.circuit.admit(
            u64::try_from(events).unwrap_or(u64::MAX),
            self.memory_bytes(),
        )
    }

    pub fn memory_bytes(&self) -> u64 {
        u64::try_from(self.capture.memory_bytes()).unwrap_or(u64::MAX)
    }

    /// Start background maintenance. Stops when `cancel` fires.
    pub fn spawn_background(&self, cancel: CancellationToken) -> JoinHandle<()> {
        spawn_reaper(
            Arc::clone(&self.pending),
            self.config.pending.reap_interval(),
            cancel,
        )
    }

    /// Queue a server warning when the state directory cannot be written.
    /// The daemon keeps running; only crash logs fall back elsewhere.
    pub fn check_state_dir(&self) -> bool {
        let dir = self.config.state_dir_path();
        match check_writable(&dir) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "state directory is not writable");
                self.warnings.push(format!(
                    "state directory {} is not writable ({e}); lifecycle logs fall back to the temp directory",
                    dir.display()
                ));
                false
            }
        }
    }

    /// Counters recorded with `daemon_shutdown` and `bridge_exit`.
    pub fn shutdown_stats(&self) -> Value {
        json!({
            "uptime_seconds": self.uptime_seconds(),
            "buffers": self.capture.sizes(),
            "pending": self.pending.stats(),
            "telemetry_clients": self.telemetry.client_count(),
            "tool_calls_in_window": self.tool_limiter.count(),
            "audit_entries": self.audit.len(),
        })
    }

    pub fn record_lifecycle(&self, event: LifecycleEvent, extra: Value) {
        self.lifecycle.record(event, extra);
    }
}

/// Await a background task at shutdown. A panic or cancellation is logged,
/// never propagated. Returns true when the task ran to completion.
pub async fn join_task(name: &'static str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) if e.is_panic() => {
            tracing::error!(task = name, error = %e, "background task panicked");
            false
        }
        Err(e) => {
            tracing::warn!(task = name, error = %e, "background task did not finish");
            false
        }
    }
}

fn check_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let marker = dir.join(format!(".write-check-{}", std::process::id()));
    std::fs::write(&marker, b"")?;
    std::fs::remove_file(&marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn daemon_in(dir: &Path) -> Daemon {
        let config = Config {
            state_dir: dir.to_string_lossy().into_owned(),
            ..Config::default()
        };
        Daemon::new(config)
    }

    #[test]
    fn writable_state_dir_queues_no_warning() {
        let tmp = TempDir::new().unwrap();
        let daemon = daemon_in(tmp.path());
        assert!(daemon.check_state_dir());
        assert!(daemon.warnings.is_empty());
    }

    #[test]
    fn unwritable_state_dir_queues_warning() {
        let tmp = TempDir::new().unwrap();
        let blocked = tmp.path().join("file");
        std::fs::write(&blocked, "x").unwrap();

        let daemon = daemon_in(&blocked);
        assert!(!daemon.check_state_dir());
        let block = daemon.warnings.drain_block().unwrap();
        assert!(block.contains("not writable"));
    }

    #[test]
    fn ingest_admission_uses_configured_threshold() {
        let tmp = TempDir::new().unwrap();
        let daemon = daemon_in(tmp.path());
        assert!(daemon.admit_ingest(10).is_allowed());
        assert!(!daemon.admit_ingest(5000).is_allowed());
    }

    #[tokio::test]
    async fn background_tasks_stop_on_cancel() {
        let tmp = TempDir::new().unwrap();
        let daemon = daemon_in(tmp.path());
        let cancel = CancellationToken::new();
        let handle = daemon.spawn_background(cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn join_task_reports_panics_without_propagating() {
        assert!(join_task("ok", tokio::spawn(async {})).await);

        let panicked = tokio::spawn(async { panic!("reaper blew up") });
        assert!(!join_task("reaper", panicked).await);

        let aborted = tokio::spawn(std::future::pending::<()>());
        aborted.abort();
        assert!(!join_task("gateway", aborted).await);
    }

    #[test]
    fn shutdown_stats_include_buffers() {
        let tmp = TempDir::new().unwrap();
        let daemon = daemon_in(tmp.path());
        let stats = daemon.shutdown_stats();
        assert_eq!(stats["buffers"]["logs"], 0);
        assert_eq!(stats["pending"]["pending"], 0);
    }
}
