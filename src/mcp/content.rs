use crate::error::CaptureError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// One block of a tool result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// Plain text content.
    Text { text: String },

    /// Base64-encoded image content.
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// Render a sequence of tool content items to a plain text string.
///
/// Text items are concatenated with newlines.
/// Non-text items produce descriptive placeholders.
pub fn render_content_to_text(content: &[ToolContent]) -> String {
    content
        .iter()
        .map(|item| match item {
            ToolContent::Text { text } => text.clone(),
            ToolContent::Image { mime_type, .. } => format!("[Image: {mime_type}]"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The `result` of a `tools/call` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            ..Self::default()
        }
    }

    /// Human summary line followed by the compact JSON payload.
    pub fn json(summary: &str, data: &Value) -> Self {
        Self::text(format!("{summary}\n{data}"))
    }

    pub fn error(err: &StructuredError) -> Self {
        Self {
            content: vec![ToolContent::text(err.render())],
            is_error: true,
            metadata: None,
        }
    }

    pub fn prepend_text(&mut self, text: impl Into<String>) {
        self.content.insert(0, ToolContent::text(text));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.content.push(ToolContent::text(text));
    }

    /// Merge `key: value` into `metadata`, creating the object if needed.
    pub fn set_metadata(&mut self, key: &str, value: Value) {
        let metadata = self
            .metadata
            .get_or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Value::Object(map) = metadata {
            map.insert(key.to_string(), value);
        }
    }
}

// ─── Structured tool errors ──────────────────────────────────────────────────

/// Machine-readable error vocabulary for failed tool calls.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    InvalidJson,
    MissingParam,
    InvalidParam,
    UnknownMode,
    PathNotAllowed,
    NotInitialized,
    NoData,
    PilotDisabled,
    RateLimited,
    CursorExpired,
    ExtensionTimeout,
    ExtensionError,
    InternalError,
    MarshalFailed,
    ExportFailed,
}

impl ErrorCode {
    /// Default recovery advice, written for the assistant.
    pub fn default_retry(self) -> &'static str {
        match self {
            Self::InvalidJson => "Fix the JSON syntax of the arguments and call again.",
            Self::MissingParam => "Add the missing parameter and call again.",
            Self::InvalidParam => "Fix the parameter value and call again.",
            Self::UnknownMode => "Use one of the values listed in the hint.",
            Self::PathNotAllowed => "Use a path inside the allowed directories.",
            Self::NotInitialized => "Wait for the server to finish starting, then retry.",
            Self::NoData => "Reproduce the activity in the browser, then call again.",
            Self::PilotDisabled => "Enable AI Web Pilot in the extension popup, then retry.",
            Self::RateLimited => "Wait a few seconds, then retry.",
            Self::CursorExpired => {
                "Call again without a cursor, or pass restart_on_eviction=true."
            }
            Self::ExtensionTimeout => {
                "Check that the extension is connected and the tab is open, then retry with backoff."
            }
            Self::ExtensionError => {
                "Read the error message, fix the page state or parameters, then retry."
            }
            Self::InternalError | Self::MarshalFailed => {
                "Do not retry. Report this as a server bug."
            }
            Self::ExportFailed => "Check the output path and free disk space, then retry.",
        }
    }
}

/// Error payload embedded in a tool result with `isError: true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{error}: {message}")]
pub struct StructuredError {
    pub error: ErrorCode,
    pub message: String,
    pub retry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl StructuredError {
    pub fn new(error: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            retry: error.default_retry().to_string(),
            param: None,
            hint: None,
        }
    }

    pub fn missing_param(param: &str) -> Self {
        Self::new(
            ErrorCode::MissingParam,
            format!("Required parameter '{param}' is missing"),
        )
        .with_param(param)
    }

    pub fn invalid_param(param: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParam, message).with_param(param)
    }

    /// An unrecognised discriminator value; `valid` lists the accepted ones.
    pub fn unknown_mode(param: &str, got: &str, valid: &[&str]) -> Self {
        Self::new(
            ErrorCode::UnknownMode,
            format!("Unknown {param} '{got}'"),
        )
        .with_param(param)
        .with_hint(format!("Valid values: {}", valid.join(", ")))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_retry(mut self, retry: impl Into<String>) -> Self {
        self.retry = retry.into();
        self
    }

    /// Human line, newline, JSON object.
    pub fn render(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"error":"{}","message":"unserializable error"}}"#, self.error)
        });
        format!("Error: {}\n{json}", self.message)
    }
}

impl From<CaptureError> for StructuredError {
    fn from(err: CaptureError) -> Self {
        match &err {
            CaptureError::InvalidCursor(_) => {
                Self::new(ErrorCode::InvalidParam, err.to_string()).with_hint(
                    "Cursors look like '2026-01-02T03:04:05.000000000Z:42'. Pass back next_cursor \
                     or prev_cursor exactly as returned.",
                )
            }
            CaptureError::CursorExpired { .. } => Self::new(
                ErrorCode::CursorExpired,
                format!("{err} ({} entries lost)", err.lost_entries()),
            ),
            CaptureError::UnknownBuffer(_) => {
                Self::new(ErrorCode::InvalidParam, err.to_string()).with_param("buffer")
            }
        }
    }
}
