//! Per-client "what changed since your last call" summaries, piggy-backed on
//! tool responses so the assistant notices new errors without polling.

use crate::capture::{CaptureStore, DeltaCounts, Tails};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use strum::{AsRefStr, Display, EnumString, VariantNames};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TelemetryMode {
    /// Attach nothing.
    Off,
    /// Attach `telemetry_changed`; add the summary only when something changed.
    #[default]
    Auto,
    /// Always attach both.
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetrySummary {
    pub new_errors_since_last_call: usize,
    pub new_network_requests_since_last_call: usize,
    pub new_network_errors_since_last_call: usize,
    pub new_websocket_events_since_last_call: usize,
    pub new_actions_since_last_call: usize,
    pub trigger_tool: String,
}

impl TelemetrySummary {
    fn new(counts: DeltaCounts, trigger_tool: &str) -> Self {
        Self {
            new_errors_since_last_call: counts.errors,
            new_network_requests_since_last_call: counts.network_requests,
            new_network_errors_since_last_call: counts.network_errors,
            new_websocket_events_since_last_call: counts.websocket_events,
            new_actions_since_last_call: counts.actions,
            trigger_tool: trigger_tool.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryMetadata {
    pub telemetry_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry_summary: Option<TelemetrySummary>,
}

/// Last-seen buffer positions for every client that has called a tool.
#[derive(Debug)]
pub struct DeltaTracker {
    clients: Mutex<HashMap<String, Tails>>,
    default_mode: Mutex<TelemetryMode>,
}

impl DeltaTracker {
    pub fn new(default_mode: TelemetryMode) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            default_mode: Mutex::new(default_mode),
        }
    }

    pub fn default_mode(&self) -> TelemetryMode {
        *self
            .default_mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_default_mode(&self, mode: TelemetryMode) {
        *self
            .default_mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = mode;
        tracing::info!(mode = %mode, "telemetry mode changed");
    }

    /// Compute the delta for `client_id` and advance its cursors to the
    /// current tails. Returns `None` when the effective mode is `off`.
    pub fn observe(
        &self,
        client_id: &str,
        store: &CaptureStore,
        trigger_tool: &str,
        mode_override: Option<TelemetryMode>,
    ) -> Option<TelemetryMetadata> {
        let mode = mode_override.unwrap_or_else(|| self.default_mode());
        if mode == TelemetryMode::Off {
            return None;
        }

        let counts = {
            let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
            match clients.get_mut(client_id) {
                Some(seen) => {
                    let (counts, tails) = store.delta_since(seen);
                    *seen = tails;
                    counts
                }
                None => {
                    clients.insert(client_id.to_string(), store.tails());
                    DeltaCounts::default()
                }
            }
        };

        let changed = !counts.is_zero();
        let summary = (changed || mode == TelemetryMode::Full)
            .then(|| TelemetrySummary::new(counts, trigger_tool));
        Some(TelemetryMetadata {
            telemetry_changed: changed,
            telemetry_summary: summary,
        })
    }

    pub fn client_count(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{LogEntry, NetworkBody};
    use crate::config::CaptureConfig;
    use serde_json::json;

    fn store() -> CaptureStore {
        CaptureStore::new(&CaptureConfig::default())
    }

    fn inject_error_and_network(store: &CaptureStore) {
        store.add_logs(vec![LogEntry::from(json!({"level": "error", "message": "boom"}))]);
        store.add_network_bodies(vec![
            NetworkBody {
                status: 503,
                ..NetworkBody::default()
            },
            NetworkBody {
                status: 200,
                ..NetworkBody::default()
            },
        ]);
    }

    #[test]
    fn auto_mode_first_call_reports_no_change() {
        let store = store();
        store.add_logs(vec![LogEntry::from(json!({"level": "error"}))]);
        let tracker = DeltaTracker::new(TelemetryMode::Auto);

        let meta = tracker.observe("a", &store, "observe", None).unwrap();
        assert!(!meta.telemetry_changed);
        assert!(meta.telemetry_summary.is_none());
    }

    #[test]
    fn auto_mode_reports_new_records() {
        let store = store();
        let tracker = DeltaTracker::new(TelemetryMode::Auto);
        tracker.observe("a", &store, "observe", None);

        inject_error_and_network(&store);
        let meta = tracker.observe("a", &store, "analyze", None).unwrap();
        assert!(meta.telemetry_changed);
        let summary = meta.telemetry_summary.unwrap();
        assert_eq!(summary.new_errors_since_last_call, 1);
        assert_eq!(summary.new_network_requests_since_last_call, 2);
        assert_eq!(summary.new_network_errors_since_last_call, 1);
        assert_eq!(summary.trigger_tool, "analyze");

        let meta = tracker.observe("a", &store, "observe", None).unwrap();
        assert!(!meta.telemetry_changed);
    }

    #[test]
    fn clients_are_tracked_independently() {
        let store = store();
        let tracker = DeltaTracker::new(TelemetryMode::Auto);
        tracker.observe("a", &store, "observe", None);
        inject_error_and_network(&store);

        let first_for_b = tracker.observe("b", &store, "observe", None).unwrap();
        assert!(!first_for_b.telemetry_changed);

        let second_for_a = tracker.observe("a", &store, "observe", None).unwrap();
        assert!(second_for_a.telemetry_changed);
        assert_eq!(tracker.client_count(), 2);
    }

    #[test]
    fn full_mode_always_attaches_summary() {
        let store = store();
        let tracker = DeltaTracker::new(TelemetryMode::Full);
        let meta = tracker.observe("a", &store, "observe", None).unwrap();
        assert!(!meta.telemetry_changed);
        assert_eq!(
            meta.telemetry_summary.unwrap().new_errors_since_last_call,
            0
        );
    }

    #[test]
    fn off_mode_attaches_nothing_and_keeps_cursors() {
        let store = store();
        let tracker = DeltaTracker::new(TelemetryMode::Auto);
        tracker.observe("a", &store, "observe", None);
        inject_error_and_network(&store);

        assert!(
            tracker
                .observe("a", &store, "observe", Some(TelemetryMode::Off))
                .is_none()
        );
        let meta = tracker.observe("a", &store, "observe", None).unwrap();
        assert!(meta.telemetry_changed);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("FULL".parse::<TelemetryMode>().unwrap(), TelemetryMode::Full);
        assert_eq!(TelemetryMode::default(), TelemetryMode::Auto);
        tracker_mode_round_trip();
    }

    fn tracker_mode_round_trip() {
        let tracker = DeltaTracker::new(TelemetryMode::Auto);
        tracker.set_default_mode(TelemetryMode::Off);
        assert_eq!(tracker.default_mode(), TelemetryMode::Off);
    }
}
