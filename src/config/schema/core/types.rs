use super::super::{CaptureConfig, GatewayConfig, IngestConfig, ToolsConfig};
use directories::{BaseDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// State directory for logs and crash diagnostics (supports `~`)
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Client identifier the stdio bridge sends as `X-Gasoline-Client`
    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub pending: PendingConfig,

    #[serde(default)]
    pub extension: ExtensionConfig,
}

fn default_state_dir() -> String {
    "~/.gasoline".into()
}

pub(crate) fn default_client_id() -> String {
    "unknown".into()
}

/// Async command correlation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfig {
    /// Deadline handed to the extension for each queued command
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// How long finished commands stay retrievable
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,
    /// Reaper tick in milliseconds
    #[serde(default = "default_reap_interval_ms")]
    pub reap_interval_ms: u64,
    /// Upper bound for a synchronous wait on a command result
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

fn default_command_timeout_secs() -> u64 {
    30
}

fn default_result_ttl_secs() -> u64 {
    60
}

fn default_reap_interval_ms() -> u64 {
    1000
}

fn default_max_wait_ms() -> u64 {
    15_000
}

impl PendingConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms.max(1))
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout_secs(),
            result_ttl_secs: default_result_ttl_secs(),
            reap_interval_ms: default_reap_interval_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

/// Browser extension liveness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionConfig {
    /// Seconds since the last `/sync` after which the extension counts as gone
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
    /// Poll interval suggested to the extension in `/sync` responses
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_heartbeat_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl ExtensionConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let gasoline_dir = home.join(".gasoline");

        Self {
            config_path: gasoline_dir.join("config.toml"),
            state_dir: default_state_dir(),
            client_id: default_client_id(),
            gateway: GatewayConfig::default(),
            capture: CaptureConfig::default(),
            ingest: IngestConfig::default(),
            tools: ToolsConfig::default(),
            pending: PendingConfig::default(),
            extension: ExtensionConfig::default(),
        }
    }
}

impl Config {
    /// Resolved state directory with `~` expanded.
    pub fn state_dir_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.state_dir).into_owned())
    }

    /// Platform data directory used by earlier releases.
    pub fn legacy_state_dir_path(&self) -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.data_local_dir().join("gasoline"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_reasonable_values() {
        let config = Config::default();

        assert_eq!(config.client_id, "unknown");
        assert_eq!(config.state_dir, "~/.gasoline");
        assert!(config.config_path.ends_with("config.toml"));
        assert_eq!(config.pending.result_ttl(), Duration::from_secs(60));
        assert_eq!(config.pending.command_timeout(), Duration::from_secs(30));
        assert_eq!(config.extension.heartbeat_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn state_dir_expands_tilde() {
        let config = Config::default();
        let path = config.state_dir_path();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with(".gasoline"));
    }

    #[test]
    fn config_toml_round_trip_preserves_serialized_fields() {
        let mut config = Config::default();
        config.gateway.port = 9123;
        config.capture.log_capacity = 42;
        config.ingest.threshold = 10;
        config.client_id = "cursor".into();

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(deserialized.gateway.port, 9123);
        assert_eq!(deserialized.capture.log_capacity, 42);
        assert_eq!(deserialized.ingest.threshold, 10);
        assert_eq!(deserialized.client_id, "cursor");
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.gateway.port, 7890);
        assert_eq!(config.tools.max_calls, 100);
        assert_eq!(config.pending.reap_interval(), Duration::from_secs(1));
    }
}
