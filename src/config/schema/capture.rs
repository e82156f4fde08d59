use serde::{Deserialize, Serialize};

/// Ring-buffer capacities, one per telemetry category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    #[serde(default = "default_network_capacity")]
    pub network_capacity: usize,
    #[serde(default = "default_websocket_capacity")]
    pub websocket_capacity: usize,
    #[serde(default = "default_action_capacity")]
    pub action_capacity: usize,
    #[serde(default = "default_vitals_capacity")]
    pub vitals_capacity: usize,
    #[serde(default = "default_extension_log_capacity")]
    pub extension_log_capacity: usize,
}

fn default_log_capacity() -> usize {
    1000
}

fn default_network_capacity() -> usize {
    200
}

fn default_websocket_capacity() -> usize {
    500
}

fn default_action_capacity() -> usize {
    200
}

fn default_vitals_capacity() -> usize {
    50
}

fn default_extension_log_capacity() -> usize {
    500
}

impl CaptureConfig {
    pub(crate) fn capacities(&self) -> [(&'static str, usize); 6] {
        [
            ("log_capacity", self.log_capacity),
            ("network_capacity", self.network_capacity),
            ("websocket_capacity", self.websocket_capacity),
            ("action_capacity", self.action_capacity),
            ("vitals_capacity", self.vitals_capacity),
            ("extension_log_capacity", self.extension_log_capacity),
        ]
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
            network_capacity: default_network_capacity(),
            websocket_capacity: default_websocket_capacity(),
            action_capacity: default_action_capacity(),
            vitals_capacity: default_vitals_capacity(),
            extension_log_capacity: default_extension_log_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacities_are_nonzero() {
        let config = CaptureConfig::default();
        assert!(config.capacities().iter().all(|(_, cap)| *cap > 0));
        assert_eq!(config.log_capacity, 1000);
    }
}
