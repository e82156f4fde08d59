//! Correlation of queued browser commands with results the extension
//! delivers later.

mod reaper;

pub use reaper::spawn_reaper;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use strum::{AsRefStr, Display, EnumString};
use tokio::sync::Notify;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CommandStatus {
    Pending,
    Complete,
    Error,
    Expired,
    Timeout,
}

impl CommandStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Terminal outcome reported by the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Outcome {
    #[strum(to_string = "complete", serialize = "success", serialize = "ok")]
    Complete,
    #[strum(to_string = "error", serialize = "failed")]
    Error,
    Timeout,
}

impl From<Outcome> for CommandStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Complete => Self::Complete,
            Outcome::Error => Self::Error,
            Outcome::Timeout => Self::Timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingCommand {
    pub correlation_id: String,
    pub client_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub params: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    sequence: u64,
    #[serde(skip)]
    dispatched: bool,
    #[serde(skip)]
    due: Instant,
    #[serde(skip)]
    settled: Option<Instant>,
}

impl PendingCommand {
    fn settle(&mut self, status: CommandStatus, now: Instant) {
        self.status = status;
        self.completed_at = Some(Utc::now());
        self.settled = Some(now);
    }
}

/// Parameters of a command to queue.
#[derive(Debug, Clone)]
pub struct NewCommand {
    pub kind: String,
    pub params: Value,
    pub tab_id: Option<i64>,
    pub client_id: String,
    pub timeout: Duration,
}

/// Per-status counts, reported on shutdown and in health output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingStats {
    pub pending: usize,
    pub complete: usize,
    pub error: usize,
    pub expired: usize,
    pub timeout: usize,
    pub created_total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub expired: usize,
    pub removed: usize,
}

/// Thread-safe registry keyed by correlation id.
#[derive(Debug)]
pub struct PendingRegistry {
    commands: Mutex<HashMap<String, PendingCommand>>,
    next_sequence: AtomicU64,
    result_ttl: Duration,
    changed: Notify,
}

impl PendingRegistry {
    pub fn new(result_ttl: Duration) -> Self {
        Self {
            commands: Mutex::new(HashMap::new()),
            next_sequence: AtomicU64::new(1),
            result_ttl,
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingCommand>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a command; returns its correlation id.
    pub fn create(&self, command: NewCommand) -> String {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let correlation_id = format!("{}_{sequence}_{}", command.kind, &nonce[..8]);

        let now = Utc::now();
        let deadline = now
            + chrono::Duration::from_std(command.timeout).unwrap_or_else(|_| chrono::Duration::zero());
        let entry = PendingCommand {
            correlation_id: correlation_id.clone(),
            client_id: command.client_id,
            kind: command.kind,
            params: command.params,
            tab_id: command.tab_id,
            created_at: now,
            deadline,
            status: CommandStatus::Pending,
            result: None,
            error: None,
            completed_at: None,
            sequence,
            dispatched: false,
            due: Instant::now() + command.timeout,
            settled: None,
        };

        tracing::debug!(correlation_id = %correlation_id, kind = %entry.kind, "command queued");
        self.lock().insert(correlation_id.clone(), entry);
        correlation_id
    }

    /// Record the extension's result. Returns false when the id is unknown or
    /// the command already reached a terminal state.
    pub fn deliver(
        &self,
        correlation_id: &str,
        outcome: Outcome,
        result: Option<Value>,
        error: Option<String>,
    ) -> bool {
        let delivered = {
            let mut commands = self.lock();
            match commands.get_mut(correlation_id) {
                Some(command) if command.status == CommandStatus::Pending => {
                    command.result = result;
                    command.error = error;
                    command.settle(outcome.into(), Instant::now());
                    true
                }
                _ => false,
            }
        };

        if delivered {
            tracing::debug!(correlation_id, outcome = %outcome, "command result delivered");
            self.changed.notify_waiters();
        } else {
            tracing::debug!(correlation_id, "ignoring result for unknown or settled command");
        }
        delivered
    }

    pub fn get(&self, correlation_id: &str) -> Option<PendingCommand> {
        self.lock().get(correlation_id).cloned()
    }

    /// Wait up to `timeout` for the command to settle. Returns the latest
    /// state, which may still be pending, or `None` for an unknown id.
    pub async fn wait(&self, correlation_id: &str, timeout: Duration) -> Option<PendingCommand> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let command = self.get(correlation_id)?;
            if command.status.is_terminal() {
                return Some(command);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.get(correlation_id);
            }
        }
    }

    /// Commands with `status`, oldest first, optionally for one client.
    pub fn list_by_status(
        &self,
        status: CommandStatus,
        client_id: Option<&str>,
    ) -> Vec<PendingCommand> {
        let mut matching: Vec<PendingCommand> = self
            .lock()
            .values()
            .filter(|c| c.status == status)
            .filter(|c| client_id.is_none_or(|id| c.client_id == id))
            .cloned()
            .collect();
        matching.sort_by_key(|c| c.sequence);
        matching
    }

    /// Pending commands the extension has not been handed yet. Each command
    /// is returned by at most one call.
    pub fn take_undispatched(&self) -> Vec<PendingCommand> {
        let mut commands = self.lock();
        let mut batch: Vec<PendingCommand> = commands
            .values_mut()
            .filter(|c| c.status == CommandStatus::Pending && !c.dispatched)
            .map(|c| {
                c.dispatched = true;
                c.clone()
            })
            .collect();
        batch.sort_by_key(|c| c.sequence);
        batch
    }

    pub fn stats(&self) -> PendingStats {
        let commands = self.lock();
        let mut stats = PendingStats {
            created_total: self.next_sequence.load(Ordering::Relaxed) - 1,
            ..PendingStats::default()
        };
        for command in commands.values() {
            match command.status {
                CommandStatus::Pending => stats.pending += 1,
                CommandStatus::Complete => stats.complete += 1,
                CommandStatus::Error => stats.error += 1,
                CommandStatus::Expired => stats.expired += 1,
                CommandStatus::Timeout => stats.timeout += 1,
            }
        }
        stats
    }

    /// Expire overdue commands and drop settled ones older than the TTL.
    pub fn reap(&self) -> ReapReport {
        self.reap_at(Instant::now())
    }

    /// [`reap`](Self::reap) as of `now`.
    pub fn reap_at(&self, now: Instant) -> ReapReport {
        let mut report = ReapReport::default();
        {
            let mut commands = self.lock();
            for command in commands.values_mut() {
                if command.status == CommandStatus::Pending && command.due < now {
                    command.error = Some(format!(
                        "{} command expired before the extension returned a result",
                        command.kind
                    ));
                    command.settle(CommandStatus::Expired, now);
                    report.expired += 1;
                }
            }
            let before = commands.len();
            let ttl = self.result_ttl;
            commands.retain(|_, c| {
                c.settled
                    .is_none_or(|settled| now.saturating_duration_since(settled) <= ttl)
            });
            report.removed = before - commands.len();
        }

        if report.expired > 0 {
            tracing::info!(expired = report.expired, "pending commands expired");
            self.changed.notify_waiters();
        }
        report
    }
}
