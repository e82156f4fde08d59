use serde::{Deserialize, Serialize};
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Admission control for extension telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Events per window above which a window counts as over threshold
    #[serde(default = "default_threshold")]
    pub threshold: u64,
    /// Length of one rate window in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Consecutive over-threshold windows that open the circuit
    #[serde(default = "default_open_after_windows")]
    pub open_after_windows: u32,
    /// Continuous below-threshold time required before closing
    #[serde(default = "default_recovery_secs")]
    pub recovery_secs: u64,
    #[serde(default = "default_memory_hard_limit")]
    pub memory_hard_limit_bytes: u64,
    #[serde(default = "default_memory_soft_limit")]
    pub memory_soft_limit_bytes: u64,
}

fn default_threshold() -> u64 {
    1000
}

fn default_window_ms() -> u64 {
    1000
}

fn default_open_after_windows() -> u32 {
    5
}

fn default_recovery_secs() -> u64 {
    10
}

fn default_memory_hard_limit() -> u64 {
    50 * MIB
}

fn default_memory_soft_limit() -> u64 {
    30 * MIB
}

impl IngestConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn recovery(&self) -> Duration {
        Duration::from_secs(self.recovery_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            window_ms: default_window_ms(),
            open_after_windows: default_open_after_windows(),
            recovery_secs: default_recovery_secs(),
            memory_hard_limit_bytes: default_memory_hard_limit(),
            memory_soft_limit_bytes: default_memory_soft_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ingest_limits() {
        let config = IngestConfig::default();
        assert_eq!(config.threshold, 1000);
        assert_eq!(config.window(), Duration::from_secs(1));
        assert_eq!(config.open_after_windows, 5);
        assert_eq!(config.recovery(), Duration::from_secs(10));
        assert_eq!(config.memory_hard_limit_bytes, 50 * 1024 * 1024);
        assert_eq!(config.memory_soft_limit_bytes, 30 * 1024 * 1024);
    }
}
