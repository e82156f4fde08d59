pub mod circuit;
pub mod redaction;
pub mod trackers;

pub use circuit::{Admission, CircuitBreaker, CircuitReason, CircuitSnapshot, RateLimitDenial};
pub use redaction::{REDACTED, redact_text, redact_value};
pub use trackers::{ToolCallLimiter, ToolRateLimited};
