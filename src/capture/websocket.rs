use super::types::WebSocketEvent;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

const MAX_ACTIVE_CONNECTIONS: usize = 20;
const MAX_CLOSED_CONNECTIONS: usize = 10;
const RATE_WINDOW: Duration = Duration::from_secs(5);
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Default)]
struct DirectionStats {
    total: u64,
    bytes: u64,
    last_at: Option<String>,
    last_preview: Option<String>,
    recent: VecDeque<Instant>,
}

impl DirectionStats {
    fn record(&mut self, event: &WebSocketEvent, now: Instant) {
        self.total += 1;
        self.bytes += event.size.unwrap_or(0);
        self.last_at.clone_from(&event.ts);
        if let Some(data) = &event.data {
            self.last_preview = Some(data.chars().take(PREVIEW_CHARS).collect());
        }
        self.recent.push_back(now);
        self.prune(now);
    }

    fn prune(&mut self, now: Instant) {
        while self
            .recent
            .front()
            .is_some_and(|t| now.duration_since(*t) > RATE_WINDOW)
        {
            self.recent.pop_front();
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn per_second(&self, now: Instant) -> f64 {
        let live = self
            .recent
            .iter()
            .filter(|t| now.duration_since(**t) <= RATE_WINDOW)
            .count();
        live as f64 / RATE_WINDOW.as_secs_f64()
    }

    fn summary(&self, now: Instant) -> DirectionSummary {
        DirectionSummary {
            total: self.total,
            bytes: self.bytes,
            per_second: self.per_second(now),
            last_at: self.last_at.clone(),
            last_preview: self.last_preview.clone(),
        }
    }
}

#[derive(Debug)]
struct Connection {
    url: String,
    state: &'static str,
    opened_at: Option<String>,
    incoming: DirectionStats,
    outgoing: DirectionStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionSummary {
    pub total: u64,
    pub bytes: u64,
    pub per_second: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionSummary {
    pub id: String,
    pub url: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<String>,
    pub incoming: DirectionSummary,
    pub outgoing: DirectionSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedConnection {
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    pub incoming_total: u64,
    pub outgoing_total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebSocketStatus {
    pub connections: Vec<ConnectionSummary>,
    pub closed: Vec<ClosedConnection>,
}

/// Live connection table derived from the WebSocket event stream.
///
/// Holds at most 20 open connections (oldest dropped first) and the last 10
/// closed ones.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    open: HashMap<String, Connection>,
    order: VecDeque<String>,
    closed: VecDeque<ClosedConnection>,
}

impl ConnectionTracker {
    pub fn observe(&mut self, event: &WebSocketEvent) {
        let now = Instant::now();
        match event.event.as_str() {
            "open" => self.on_open(event),
            "close" => self.on_close(event),
            "error" => {
                if let Some(conn) = self.open.get_mut(&event.id) {
                    conn.state = "error";
                }
            }
            "message" => {
                if let Some(conn) = self.open.get_mut(&event.id) {
                    match event.direction.as_deref() {
                        Some("incoming") => conn.incoming.record(event, now),
                        Some("outgoing") => conn.outgoing.record(event, now),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn on_open(&mut self, event: &WebSocketEvent) {
        if self.open.len() >= MAX_ACTIVE_CONNECTIONS
            && let Some(oldest) = self.order.pop_front()
        {
            self.open.remove(&oldest);
        }
        self.order.retain(|id| id != &event.id);
        self.order.push_back(event.id.clone());
        self.open.insert(
            event.id.clone(),
            Connection {
                url: event.url.clone(),
                state: "open",
                opened_at: event.ts.clone(),
                incoming: DirectionStats::default(),
                outgoing: DirectionStats::default(),
            },
        );
    }

    fn on_close(&mut self, event: &WebSocketEvent) {
        let Some(conn) = self.open.remove(&event.id) else {
            return;
        };
        self.order.retain(|id| id != &event.id);
        self.closed.push_back(ClosedConnection {
            id: event.id.clone(),
            url: conn.url,
            opened_at: conn.opened_at,
            closed_at: event.ts.clone(),
            close_code: event.close_code,
            close_reason: event.close_reason.clone(),
            incoming_total: conn.incoming.total,
            outgoing_total: conn.outgoing.total,
        });
        while self.closed.len() > MAX_CLOSED_CONNECTIONS {
            self.closed.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.open.clear();
        self.order.clear();
        self.closed.clear();
    }

    /// Snapshot filtered by optional URL substring and connection id.
    pub fn status(&self, url: Option<&str>, connection_id: Option<&str>) -> WebSocketStatus {
        let now = Instant::now();
        let keep = |id: &str, conn_url: &str| {
            url.is_none_or(|u| conn_url.contains(u)) && connection_id.is_none_or(|c| c == id)
        };

        let connections = self
            .order
            .iter()
            .filter_map(|id| self.open.get(id).map(|conn| (id, conn)))
            .filter(|(id, conn)| keep(id, &conn.url))
            .map(|(id, conn)| ConnectionSummary {
                id: id.clone(),
                url: conn.url.clone(),
                state: conn.state.to_string(),
                opened_at: conn.opened_at.clone(),
                incoming: conn.incoming.summary(now),
                outgoing: conn.outgoing.summary(now),
            })
            .collect();
        let closed = self
            .closed
            .iter()
            .filter(|c| keep(&c.id, &c.url))
            .cloned()
            .collect();

        WebSocketStatus {
            connections,
            closed,
        }
    }
}
