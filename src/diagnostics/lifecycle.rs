//! Append-only lifecycle/crash log.
//!
//! Each event is one JSON line written to the first location that accepts it:
//! the state directory, then the legacy state directory, then the system temp
//! directory.

use crate::config::Config;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use strum::{AsRefStr, Display};

const LOG_FILE: &str = "crash.log";
const TMP_FILE: &str = "gasoline-crash.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleEvent {
    DaemonStart,
    DaemonShutdown,
    BridgeExit,
}

#[derive(Debug, Clone)]
pub struct LifecycleLog {
    candidates: Vec<PathBuf>,
}

impl LifecycleLog {
    pub fn new(state_dir: &Path, legacy_state_dir: Option<&Path>) -> Self {
        let mut candidates = vec![state_dir.join("logs").join(LOG_FILE)];
        if let Some(legacy) = legacy_state_dir {
            candidates.push(legacy.join("logs").join(LOG_FILE));
        }
        candidates.push(std::env::temp_dir().join(TMP_FILE));
        Self { candidates }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.state_dir_path(),
            config.legacy_state_dir_path().as_deref(),
        )
    }

    /// Append one event. Returns the file written, or `None` when every
    /// candidate failed.
    pub fn record(&self, event: LifecycleEvent, extra: Value) -> Option<PathBuf> {
        let line = entry(event, extra).to_string();
        for path in &self.candidates {
            match append_line(path, &line) {
                Ok(()) => {
                    tracing::debug!(event = %event, path = %path.display(), "lifecycle event recorded");
                    return Some(path.clone());
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "lifecycle log location rejected");
                }
            }
        }
        tracing::warn!(event = %event, "no writable location for lifecycle log");
        None
    }
}

fn entry(event: LifecycleEvent, extra: Value) -> Value {
    let mut map = Map::new();
    map.insert("type".into(), json!("lifecycle"));
    map.insert("event".into(), json!(event.as_ref()));
    map.insert(
        "timestamp".into(),
        json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    map.insert("pid".into(), json!(std::process::id()));
    map.insert("version".into(), json!(env!("CARGO_PKG_VERSION")));
    map.insert("os".into(), json!(std::env::consts::OS));
    map.insert("arch".into(), json!(std::env::consts::ARCH));
    if let Value::Object(extra) = extra {
        for (key, value) in extra {
            map.entry(key).or_insert(value);
        }
    }
    Value::Object(map)
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        create_private_dir(parent)?;
    }
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    writeln!(file, "{line}")
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o750);
    }
    builder.create(dir)
}
