//! In-memory telemetry capture: one bounded ring buffer per category, each
//! behind its own lock.

pub mod binary;
pub mod cursor;
pub mod filter;
pub mod noise;
pub mod ring_buffer;
pub mod types;
pub mod websocket;

pub use binary::{BinaryFormat, detect_binary_format};
pub use cursor::Cursor;
pub use filter::{ActionFilter, LogFilter, NetworkFilter, Pagination, WebSocketFilter};
pub use noise::{NoiseMatchSpec, NoiseRule, NoiseRuleError, NoiseRules};
pub use ring_buffer::{CursorMode, Page, PageMeta, PageRequest, RingBuffer, Stamped};
pub use types::{
    EnhancedAction, ExtensionLog, Footprint, LogEntry, LogLevel, NetworkBody, VitalsSnapshot,
    WebSocketEvent,
};
pub use websocket::{ConnectionTracker, WebSocketStatus};

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Buffer categories, named the way tools and endpoints spell them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Logs,
    Network,
    #[strum(to_string = "websocket", serialize = "websocket_events")]
    Websocket,
    Actions,
    Vitals,
    ExtensionLogs,
}

/// Retained entry count per buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BufferSizes {
    pub logs: usize,
    pub network: usize,
    pub websocket: usize,
    pub actions: usize,
    pub vitals: usize,
    pub extension_logs: usize,
}

impl BufferSizes {
    pub fn total(&self) -> usize {
        self.logs + self.network + self.websocket + self.actions + self.vitals + self.extension_logs
    }
}

/// Newest sequence per buffer that feeds telemetry deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tails {
    pub logs: u64,
    pub network: u64,
    pub websocket: u64,
    pub actions: u64,
}

/// New-record counts between two [`Tails`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaCounts {
    pub errors: usize,
    pub network_requests: usize,
    pub network_errors: usize,
    pub websocket_events: usize,
    pub actions: usize,
}

impl DeltaCounts {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug)]
struct WebSocketBuffer {
    events: RingBuffer<WebSocketEvent>,
    connections: ConnectionTracker,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn tag_network_format(body: &mut NetworkBody) {
    if body.binary_format.is_none()
        && let Some(format) = detect_binary_format(body.response_body.as_bytes())
    {
        body.binary_format = Some(format.name.to_string());
        body.format_confidence = Some(format.confidence);
    }
}

fn tag_websocket_format(event: &mut WebSocketEvent) {
    if event.binary_format.is_none()
        && event.event == "message"
        && let Some(data) = &event.data
        && let Some(format) = detect_binary_format(data.as_bytes())
    {
        event.binary_format = Some(format.name.to_string());
        event.format_confidence = Some(format.confidence);
    }
}

/// All capture buffers. Cross-category reads are not atomic.
#[derive(Debug)]
pub struct CaptureStore {
    logs: Mutex<RingBuffer<LogEntry>>,
    network: Mutex<RingBuffer<NetworkBody>>,
    websocket: Mutex<WebSocketBuffer>,
    actions: Mutex<RingBuffer<EnhancedAction>>,
    vitals: Mutex<RingBuffer<VitalsSnapshot>>,
    extension_logs: Mutex<RingBuffer<ExtensionLog>>,
}

impl CaptureStore {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            logs: Mutex::new(RingBuffer::new(config.log_capacity)),
            network: Mutex::new(RingBuffer::new(config.network_capacity)),
            websocket: Mutex::new(WebSocketBuffer {
                events: RingBuffer::new(config.websocket_capacity),
                connections: ConnectionTracker::default(),
            }),
            actions: Mutex::new(RingBuffer::new(config.action_capacity)),
            vitals: Mutex::new(RingBuffer::new(config.vitals_capacity)),
            extension_logs: Mutex::new(RingBuffer::new(config.extension_log_capacity)),
        }
    }

    // ── Append ─────────────────────────────────────────────────────────────

    pub fn add_logs(&self, entries: Vec<LogEntry>) -> u64 {
        lock(&self.logs).append_batch(entries)
    }

    pub fn add_network_bodies(&self, mut bodies: Vec<NetworkBody>) -> u64 {
        bodies.iter_mut().for_each(tag_network_format);
        lock(&self.network).append_batch(bodies)
    }

    pub fn add_websocket_events(&self, mut events: Vec<WebSocketEvent>) -> u64 {
        events.iter_mut().for_each(tag_websocket_format);
        let mut buffer = lock(&self.websocket);
        for event in &events {
            buffer.connections.observe(event);
        }
        buffer.events.append_batch(events)
    }

    pub fn add_actions(&self, actions: Vec<EnhancedAction>) -> u64 {
        lock(&self.actions).append_batch(actions)
    }

    pub fn add_vitals(&self, vitals: Vec<VitalsSnapshot>) -> u64 {
        lock(&self.vitals).append_batch(vitals)
    }

    pub fn add_extension_logs(&self, logs: Vec<ExtensionLog>) -> u64 {
        lock(&self.extension_logs).append_batch(logs)
    }

    // ── Read ───────────────────────────────────────────────────────────────

    pub fn read_logs(
        &self,
        request: &PageRequest,
        filter: &LogFilter,
    ) -> Result<Page<LogEntry>, CaptureError> {
        lock(&self.logs).read(request, |e| filter.matches(e))
    }

    /// [`read_logs`](Self::read_logs) leaving out entries `noise` flags.
    pub fn read_logs_without_noise(
        &self,
        request: &PageRequest,
        filter: &LogFilter,
        noise: &NoiseRules,
    ) -> Result<Page<LogEntry>, CaptureError> {
        if noise.is_empty() {
            return self.read_logs(request, filter);
        }
        lock(&self.logs).read(request, |e| filter.matches(e) && !noise.is_noise(e))
    }

    pub fn read_network(
        &self,
        request: &PageRequest,
        filter: &NetworkFilter,
    ) -> Result<Page<NetworkBody>, CaptureError> {
        lock(&self.network).read(request, |b| filter.matches(b))
    }

    pub fn read_websocket(
        &self,
        request: &PageRequest,
        filter: &WebSocketFilter,
    ) -> Result<Page<WebSocketEvent>, CaptureError> {
        lock(&self.websocket)
            .events
            .read(request, |e| filter.matches(e))
    }

    pub fn read_actions(
        &self,
        request: &PageRequest,
        filter: &ActionFilter,
    ) -> Result<Page<EnhancedAction>, CaptureError> {
        lock(&self.actions).read(request, |a| filter.matches(a))
    }

    pub fn read_vitals(&self, request: &PageRequest) -> Result<Page<VitalsSnapshot>, CaptureError> {
        lock(&self.vitals).read(request, |_| true)
    }

    pub fn read_extension_logs(
        &self,
        request: &PageRequest,
    ) -> Result<Page<ExtensionLog>, CaptureError> {
        lock(&self.extension_logs).read(request, |_| true)
    }

    pub fn websocket_status(&self, url: Option<&str>, connection_id: Option<&str>) -> WebSocketStatus {
        lock(&self.websocket).connections.status(url, connection_id)
    }

    // ── Maintenance ────────────────────────────────────────────────────────

    pub fn clear(&self, category: Category) {
        match category {
            Category::Logs => lock(&self.logs).clear(),
            Category::Network => lock(&self.network).clear(),
            Category::Websocket => {
                let mut buffer = lock(&self.websocket);
                buffer.events.clear();
                buffer.connections.clear();
            }
            Category::Actions => lock(&self.actions).clear(),
            Category::Vitals => lock(&self.vitals).clear(),
            Category::ExtensionLogs => lock(&self.extension_logs).clear(),
        }
        tracing::debug!(category = %category, "capture buffer cleared");
    }

    pub fn clear_all(&self) {
        use strum::IntoEnumIterator;
        Category::iter().for_each(|category| self.clear(category));
    }

    pub fn sizes(&self) -> BufferSizes {
        BufferSizes {
            logs: lock(&self.logs).len(),
            network: lock(&self.network).len(),
            websocket: lock(&self.websocket).events.len(),
            actions: lock(&self.actions).len(),
            vitals: lock(&self.vitals).len(),
            extension_logs: lock(&self.extension_logs).len(),
        }
    }

    /// Approximate bytes held across all buffers.
    pub fn memory_bytes(&self) -> usize {
        lock(&self.logs).bytes()
            + lock(&self.network).bytes()
            + lock(&self.websocket).events.bytes()
            + lock(&self.actions).bytes()
            + lock(&self.vitals).bytes()
            + lock(&self.extension_logs).bytes()
    }

    pub fn tails(&self) -> Tails {
        Tails {
            logs: lock(&self.logs).tail_seq(),
            network: lock(&self.network).tail_seq(),
            websocket: lock(&self.websocket).events.tail_seq(),
            actions: lock(&self.actions).tail_seq(),
        }
    }

    /// Count records newer than `since` and return the current tails.
    ///
    /// Each buffer is counted and its tail read under a single lock, so a
    /// record is counted by exactly one delta.
    pub fn delta_since(&self, since: &Tails) -> (DeltaCounts, Tails) {
        let mut counts = DeltaCounts::default();
        let mut tails = Tails::default();
        {
            let logs = lock(&self.logs);
            counts.errors = logs.count_since(since.logs, LogEntry::is_error);
            tails.logs = logs.tail_seq();
        }
        {
            let network = lock(&self.network);
            counts.network_requests = network.count_since(since.network, |_| true);
            counts.network_errors = network.count_since(since.network, NetworkBody::is_error);
            tails.network = network.tail_seq();
        }
        {
            let websocket = lock(&self.websocket);
            counts.websocket_events = websocket.events.count_since(since.websocket, |_| true);
            tails.websocket = websocket.events.tail_seq();
        }
        {
            let actions = lock(&self.actions);
            counts.actions = actions.count_since(since.actions, |_| true);
            tails.actions = actions.tail_seq();
        }
        (counts, tails)
    }
}
