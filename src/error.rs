use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the gasoline daemon.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; process glue (CLI, server start-up, the
/// stdio bridge) continues to use `anyhow::Result` for context chains.
#[derive(Debug, Error)]
pub enum GasolineError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Capture buffers ─────────────────────────────────────────────────
    #[error("capture: {0}")]
    Capture(#[from] CaptureError),

    // ── JSON-RPC protocol ───────────────────────────────────────────────
    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),

    // ── Transport (HTTP, stdio bridge) ──────────────────────────────────
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Capture errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("invalid cursor format: {0}")]
    InvalidCursor(String),

    #[error(
        "cursor expired (buffer overflow): requested sequence {requested}, oldest available is {oldest}"
    )]
    CursorExpired { requested: u64, oldest: u64 },

    #[error("unknown buffer: {0}")]
    UnknownBuffer(String),
}

impl CaptureError {
    /// Number of entries lost between an expired cursor and the oldest retained entry.
    pub fn lost_entries(&self) -> u64 {
        match self {
            Self::CursorExpired { requested, oldest } => oldest.saturating_sub(*requested + 1),
            _ => 0,
        }
    }
}

// ─── Protocol errors ─────────────────────────────────────────────────────────

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const RESOURCE_NOT_FOUND: i32 = -32002;

/// Errors surfaced outside `result` in a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid Request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    Internal(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
}

impl ProtocolError {
    pub fn code(&self) -> i32 {
        match self {
            Self::Parse(_) => PARSE_ERROR,
            Self::InvalidRequest(_) => INVALID_REQUEST,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::Internal(_) => INTERNAL_ERROR,
            Self::ResourceNotFound(_) => RESOURCE_NOT_FOUND,
        }
    }
}

// ─── Transport errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("gateway: {0}")]
    Gateway(String),

    #[error("bridge upstream {url} failed: {message}")]
    Bridge { url: String, message: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used by library functions that return `GasolineError`.
pub type Result<T> = std::result::Result<T, GasolineError>;
