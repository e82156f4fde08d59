use crate::telemetry::TelemetryMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Assistant-facing tool call settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Maximum admitted tool calls per window
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,
    /// Tool-call window in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Default passive telemetry mode: "off" | "auto" | "full"
    #[serde(default)]
    pub telemetry_mode: TelemetryMode,
    /// Tool calls kept in the in-memory audit trail
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

fn default_max_calls() -> usize {
    100
}

fn default_window_secs() -> u64 {
    60
}

fn default_audit_capacity() -> usize {
    1000
}

impl ToolsConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_calls: default_max_calls(),
            window_secs: default_window_secs(),
            telemetry_mode: TelemetryMode::default(),
            audit_capacity: default_audit_capacity(),
        }
    }
}
