use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumString};

/// Approximate heap footprint of a captured record, used for memory admission.
pub trait Footprint {
    fn footprint(&self) -> usize;
}

const RECORD_OVERHEAD: usize = 64;

fn opt_len(value: Option<&String>) -> usize {
    value.map_or(0, String::len)
}

fn value_footprint(value: &Value) -> usize {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => 8,
        Value::String(s) => s.len(),
        Value::Array(items) => items.iter().map(value_footprint).sum::<usize>() + 16,
        Value::Object(map) => {
            map.iter()
                .map(|(k, v)| k.len() + value_footprint(v))
                .sum::<usize>()
                + 16
        }
    }
}

// ─── Logs ────────────────────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    Trace,
    Debug,
    #[strum(to_string = "info", serialize = "log")]
    Info,
    #[strum(to_string = "warn", serialize = "warning")]
    Warn,
    Error,
}

/// Console log entry with dynamic fields.
///
/// Well-known keys: `ts`, `level`, `message`, `source`, `url`, `tabId`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntry(pub Map<String, Value>);

impl LogEntry {
    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn level(&self) -> Option<LogLevel> {
        self.str_field("level").and_then(|l| l.parse().ok())
    }

    pub fn is_error(&self) -> bool {
        self.level() == Some(LogLevel::Error)
    }

    pub fn message(&self) -> &str {
        self.str_field("message").unwrap_or_default()
    }

    pub fn source(&self) -> &str {
        self.str_field("source").unwrap_or_default()
    }

    pub fn url(&self) -> &str {
        self.str_field("url").unwrap_or_default()
    }

    pub fn ts(&self) -> Option<&str> {
        self.str_field("ts")
    }

    pub fn tab_id(&self) -> Option<i64> {
        self.0.get("tabId").and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        })
    }
}

impl From<Value> for LogEntry {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            other => {
                let mut map = Map::new();
                map.insert("message".into(), other);
                Self(map)
            }
        }
    }
}

impl Footprint for LogEntry {
    fn footprint(&self) -> usize {
        self.0
            .iter()
            .map(|(k, v)| k.len() + value_footprint(v))
            .sum::<usize>()
            + RECORD_OVERHEAD
    }
}

// ─── Network ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkBody {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub duration_ms: f64,
    pub request_body: String,
    pub response_body: String,
    pub response_size: u64,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl NetworkBody {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

impl Footprint for NetworkBody {
    fn footprint(&self) -> usize {
        self.method.len()
            + self.url.len()
            + self.request_body.len()
            + self.response_body.len()
            + self.content_type.len()
            + opt_len(self.binary_format.as_ref())
            + opt_len(self.ts.as_ref())
            + RECORD_OVERHEAD
    }
}

// ─── WebSocket ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketEvent {
    /// open | message | close | error
    pub event: String,
    /// Connection id assigned by the extension
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl Footprint for WebSocketEvent {
    fn footprint(&self) -> usize {
        self.event.len()
            + self.id.len()
            + self.url.len()
            + opt_len(self.direction.as_ref())
            + opt_len(self.data.as_ref())
            + opt_len(self.close_reason.as_ref())
            + opt_len(self.binary_format.as_ref())
            + opt_len(self.ts.as_ref())
            + RECORD_OVERHEAD
    }
}

// ─── Actions ─────────────────────────────────────────────────────────────────

/// A user interaction recorded by the extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancedAction {
    #[serde(rename = "type")]
    pub kind: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub selectors: BTreeMap<String, Value>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
}

impl EnhancedAction {
    /// Best selector for replaying this action, preferring test ids.
    pub fn preferred_selector(&self) -> Option<String> {
        ["testId", "ariaLabel", "role", "id", "css", "text"]
            .iter()
            .find_map(|key| {
                let value = self.selectors.get(*key)?;
                let raw = value.as_str()?;
                let selector = match *key {
                    "testId" => format!("[data-testid=\"{raw}\"]"),
                    "ariaLabel" => format!("[aria-label=\"{raw}\"]"),
                    "id" if !raw.starts_with('#') => format!("#{raw}"),
                    "text" => format!("text={raw}"),
                    _ => raw.to_string(),
                };
                Some(selector)
            })
    }
}

impl Footprint for EnhancedAction {
    fn footprint(&self) -> usize {
        self.kind.len()
            + self.url.len()
            + self
                .selectors
                .iter()
                .map(|(k, v)| k.len() + value_footprint(v))
                .sum::<usize>()
            + opt_len(self.value.as_ref())
            + opt_len(self.to_url.as_ref())
            + opt_len(self.from_url.as_ref())
            + RECORD_OVERHEAD
    }
}

// ─── Vitals ──────────────────────────────────────────────────────────────────

/// One Web Vitals sample for a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalsSnapshot {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcp_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcp_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inp_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttfb_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cls: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl Footprint for VitalsSnapshot {
    fn footprint(&self) -> usize {
        self.url.len() + opt_len(self.ts.as_ref()) + RECORD_OVERHEAD
    }
}

// ─── Extension logs ──────────────────────────────────────────────────────────

/// Diagnostic log line emitted by the extension itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionLog {
    pub level: String,
    pub message: String,
    pub source: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: String,
}

impl Footprint for ExtensionLog {
    fn footprint(&self) -> usize {
        self.level.len()
            + self.message.len()
            + self.source.len()
            + self.category.len()
            + self.data.as_ref().map_or(0, value_footprint)
            + self.timestamp.len()
            + RECORD_OVERHEAD
    }
}
