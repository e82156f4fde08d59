//! Which browser tab the extension is observing, and whether the extension is
//! alive at all.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Settings block reported by the extension on every `/sync`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtensionSettings {
    pub pilot_enabled: bool,
    pub tracking_enabled: bool,
    pub tracked_tab_id: Option<i64>,
    pub tracked_tab_url: Option<String>,
    pub tracked_tab_title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackingState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_tab_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_tab_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_tab_title: Option<String>,
    pub tracking_enabled: bool,
    pub pilot_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// The extension has sent a settings block at least once.
    pub reported_once: bool,
    #[serde(skip)]
    last_heartbeat: Option<Instant>,
}

/// Lock-free holder of the current [`TrackingState`]. Only extension
/// requests write to it.
#[derive(Debug)]
pub struct TrackingCache {
    state: ArcSwap<TrackingState>,
    heartbeat_timeout: Duration,
}

impl TrackingCache {
    pub fn new(heartbeat_timeout: Duration) -> Self {
        Self {
            state: ArcSwap::from_pointee(TrackingState::default()),
            heartbeat_timeout,
        }
    }

    pub fn snapshot(&self) -> Arc<TrackingState> {
        self.state.load_full()
    }

    /// Apply one extension heartbeat. A missing settings block keeps the
    /// previously reported tab.
    pub fn record_sync(
        &self,
        session_id: Option<&str>,
        extension_version: Option<&str>,
        settings: Option<&ExtensionSettings>,
    ) {
        self.record_sync_at(session_id, extension_version, settings, Instant::now());
    }

    pub(crate) fn record_sync_at(
        &self,
        session_id: Option<&str>,
        extension_version: Option<&str>,
        settings: Option<&ExtensionSettings>,
        now: Instant,
    ) {
        let previous = self.state.rcu(|current| {
            let mut next = TrackingState::clone(current);
            next.last_heartbeat = Some(now);
            next.last_heartbeat_at = Some(Utc::now());
            if let Some(session_id) = session_id {
                next.session_id = Some(session_id.to_string());
            }
            if let Some(version) = extension_version.filter(|v| !v.is_empty()) {
                next.extension_version = Some(version.to_string());
            }
            if let Some(settings) = settings {
                next.tracked_tab_id = settings.tracked_tab_id;
                next.tracked_tab_url.clone_from(&settings.tracked_tab_url);
                next.tracked_tab_title.clone_from(&settings.tracked_tab_title);
                next.tracking_enabled = settings.tracking_enabled;
                next.pilot_enabled = settings.pilot_enabled;
                next.reported_once = true;
            }
            next
        });

        if previous.last_heartbeat.is_none() {
            tracing::info!(
                version = extension_version.unwrap_or("unknown"),
                "extension connected"
            );
        }
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected_at(Instant::now())
    }

    pub(crate) fn is_connected_at(&self, now: Instant) -> bool {
        self.state
            .load()
            .last_heartbeat
            .is_some_and(|at| now.saturating_duration_since(at) <= self.heartbeat_timeout)
    }

    /// Pilot counts as disabled only once the extension has said so.
    pub fn pilot_disabled(&self) -> bool {
        let state = self.state.load();
        state.reported_once && !state.pilot_enabled
    }

    /// Warning for a connected extension that is not tracking any tab.
    /// Nothing is reported before the extension's first settings block.
    pub fn tracking_warning(&self) -> Option<String> {
        self.tracking_warning_at(Instant::now())
    }

    pub(crate) fn tracking_warning_at(&self, now: Instant) -> Option<String> {
        let state = self.state.load();
        (self.is_connected_at(now) && state.reported_once && state.tracked_tab_id.is_none()).then(
            || {
                "No tab is being tracked. Open the extension popup and click \"Track This Tab\" \
                 so observe/interact target the right page."
                    .to_string()
            },
        )
    }

    /// Warning when the extension's major.minor differs from `server_version`.
    pub fn version_warning(&self, server_version: &str) -> Option<String> {
        let state = self.state.load();
        let extension = state.extension_version.as_deref()?;
        (major_minor(extension)? != major_minor(server_version)?).then(|| {
            format!(
                "Extension version {extension} does not match server version {server_version}. \
                 Update the extension or the server so both run the same release."
            )
        })
    }
}

fn major_minor(version: &str) -> Option<(u64, u64)> {
    let mut parts = version.trim().trim_start_matches('v').split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}
