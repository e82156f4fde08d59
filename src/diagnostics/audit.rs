//! In-memory audit trail of assistant tool calls.
//!
//! Every `tools/call` leaves one entry, including calls the limiter refused,
//! attributed to the client id the transport supplied. The trail is a bounded
//! FIFO; the oldest entries fall off first.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use strum::Display;

pub const DEFAULT_QUERY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditOutcome {
    Ok,
    Error,
    RateLimited,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub client_id: String,
    pub tool: String,
    pub outcome: AuditOutcome,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEntry {
    pub fn new(client_id: &str, tool: &str, outcome: AuditOutcome, elapsed: Duration) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            client_id: client_id.to_string(),
            tool: tool.to_string(),
            outcome,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            error: None,
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Selection for [`AuditTrail::query`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery<'a> {
    pub client_id: Option<&'a str>,
    pub tool: Option<&'a str>,
    pub limit: Option<usize>,
}

#[derive(Debug)]
pub struct AuditTrail {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, entry: AuditEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Matching entries, newest last. `limit` keeps the most recent ones.
    pub fn query(&self, query: &AuditQuery<'_>) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let limit = query.limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        let mut matched: Vec<AuditEntry> = entries
            .iter()
            .rev()
            .filter(|e| query.client_id.is_none_or(|id| e.client_id == id))
            .filter(|e| query.tool.is_none_or(|tool| e.tool == tool))
            .take(limit)
            .cloned()
            .collect();
        matched.reverse();
        matched
    }

    /// Drop everything. Returns how many entries were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let cleared = entries.len();
        entries.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
