use super::ring_buffer::PageRequest;
use super::types::{EnhancedAction, LogEntry, LogLevel, NetworkBody, WebSocketEvent};
use crate::error::CaptureError;
use serde::{Deserialize, Deserializer};

/// Page size used when a caller passes neither `limit` nor `last_n`.
pub const DEFAULT_PAGE_LIMIT: usize = 100;
/// Largest page any single read may return.
pub const MAX_PAGE_LIMIT: usize = 1000;

/// Cursor and size parameters shared by every buffer read.
///
/// Decoded from HTTP query strings and from tool arguments alike, so every
/// field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub limit: Option<usize>,
    pub last_n: Option<usize>,
    pub after_cursor: Option<String>,
    pub before_cursor: Option<String>,
    pub since_cursor: Option<String>,
    pub restart_on_eviction: bool,
}

impl Pagination {
    pub fn to_request(&self) -> Result<PageRequest, CaptureError> {
        let limit = self
            .limit
            .or(self.last_n)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        PageRequest::from_params(
            self.after_cursor.as_deref(),
            self.before_cursor.as_deref(),
            self.since_cursor.as_deref(),
            limit,
            self.restart_on_eviction,
        )
    }
}

fn level_opt<'de, D>(deserializer: D) -> Result<Option<LogLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("" | "all") => Ok(None),
        Some(level) => level
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("unknown log level '{level}'"))),
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

// ─── Logs ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogFilter {
    /// Exact level match
    #[serde(deserialize_with = "level_opt")]
    pub level: Option<LogLevel>,
    /// Entries at or above this level
    #[serde(deserialize_with = "level_opt")]
    pub min_level: Option<LogLevel>,
    pub source: Option<String>,
    pub url: Option<String>,
}

impl LogFilter {
    pub fn errors_only() -> Self {
        Self {
            level: Some(LogLevel::Error),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        let level = entry.level();
        if let Some(wanted) = self.level
            && level != Some(wanted)
        {
            return false;
        }
        if let Some(floor) = self.min_level
            && level.is_none_or(|l| l < floor)
        {
            return false;
        }
        if let Some(source) = non_empty(self.source.as_ref())
            && entry.source() != source
        {
            return false;
        }
        non_empty(self.url.as_ref()).is_none_or(|url| contains_ci(entry.url(), url))
    }
}

// ─── Network ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkFilter {
    pub url: Option<String>,
    pub method: Option<String>,
    pub status_min: Option<u16>,
    pub status_max: Option<u16>,
}

impl NetworkFilter {
    pub fn matches(&self, body: &NetworkBody) -> bool {
        if let Some(url) = non_empty(self.url.as_ref())
            && !contains_ci(&body.url, url)
        {
            return false;
        }
        if let Some(method) = non_empty(self.method.as_ref())
            && !body.method.eq_ignore_ascii_case(method)
        {
            return false;
        }
        self.status_min.is_none_or(|min| body.status >= min)
            && self.status_max.is_none_or(|max| body.status <= max)
    }
}

// ─── WebSocket ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebSocketFilter {
    pub connection_id: Option<String>,
    pub url: Option<String>,
    pub direction: Option<String>,
    pub event: Option<String>,
}

impl WebSocketFilter {
    pub fn matches(&self, event: &WebSocketEvent) -> bool {
        if let Some(id) = non_empty(self.connection_id.as_ref())
            && event.id != id
        {
            return false;
        }
        if let Some(url) = non_empty(self.url.as_ref())
            && !contains_ci(&event.url, url)
        {
            return false;
        }
        if let Some(direction) = non_empty(self.direction.as_ref())
            && event.direction.as_deref() != Some(direction)
        {
            return false;
        }
        non_empty(self.event.as_ref()).is_none_or(|kind| event.event == kind)
    }
}

// ─── Actions ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActionFilter {
    #[serde(alias = "action_type")]
    pub kind: Option<String>,
    pub url: Option<String>,
}

impl ActionFilter {
    pub fn matches(&self, action: &EnhancedAction) -> bool {
        if let Some(kind) = non_empty(self.kind.as_ref())
            && action.kind != kind
        {
            return false;
        }
        non_empty(self.url.as_ref()).is_none_or(|url| contains_ci(&action.url, url))
    }
}
