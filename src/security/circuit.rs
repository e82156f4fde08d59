//! Global admission gate for extension telemetry.
//!
//! Counts events per fixed window. A window with more than `threshold` events
//! is "over"; `open_after_windows` consecutive over windows, or memory above
//! the hard limit, open the circuit. It closes again once memory is at or
//! under the soft limit and traffic has stayed under threshold for the full
//! recovery period.

use crate::config::IngestConfig;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use strum::{AsRefStr, Display};

/// Clients are told to back off this long on any denial.
pub const RETRY_AFTER_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CircuitReason {
    RateExceeded,
    MemoryExceeded,
}

#[derive(Debug)]
struct CircuitState {
    open: bool,
    opened_at: Option<DateTime<Utc>>,
    reason: Option<CircuitReason>,
    rate_streak: u32,
    below_since: Option<Instant>,
    window_start: Instant,
    window_event_count: u64,
}

/// Body of a 429 ingest response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDenial {
    pub error: &'static str,
    pub message: String,
    pub retry_after_ms: u64,
    pub threshold: u64,
    pub circuit_open: bool,
    pub current_rate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny(RateLimitDenial),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub circuit_open: bool,
    pub reason: Option<CircuitReason>,
    pub current_rate: u64,
    pub threshold: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<String>,
    pub rate_streak: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u64,
    window: Duration,
    open_after_windows: u32,
    recovery: Duration,
    memory_hard_limit: u64,
    memory_soft_limit: u64,
    state: Mutex<CircuitState>,
}

impl CircuitBreaker {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            threshold: config.threshold,
            window: config.window(),
            open_after_windows: config.open_after_windows,
            recovery: config.recovery(),
            memory_hard_limit: config.memory_hard_limit_bytes,
            memory_soft_limit: config.memory_soft_limit_bytes,
            state: Mutex::new(CircuitState {
                open: false,
                opened_at: None,
                reason: None,
                rate_streak: 0,
                below_since: None,
                window_start: Instant::now(),
                window_event_count: 0,
            }),
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Account for an ingest batch of `events` and decide whether to accept it.
    pub fn admit(&self, events: u64, memory_bytes: u64) -> Admission {
        self.admit_at(events, memory_bytes, Instant::now())
    }

    pub(crate) fn admit_at(&self, events: u64, memory_bytes: u64, now: Instant) -> Admission {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.roll_window(&mut state, now);
        state.window_event_count = state.window_event_count.saturating_add(events);
        self.evaluate(&mut state, memory_bytes, now);

        if !state.open && state.window_event_count <= self.threshold {
            return Admission::Allow;
        }
        Admission::Deny(RateLimitDenial {
            error: "rate_limited",
            message: format!(
                "Server receiving >{} events/sec. Retry after backoff.",
                self.threshold
            ),
            retry_after_ms: RETRY_AFTER_MS,
            threshold: self.threshold,
            circuit_open: state.open,
            current_rate: state.window_event_count,
        })
    }

    /// Current state. Elapsed windows are evaluated first, so an idle
    /// daemon still reports an accurate open/closed status.
    pub fn snapshot(&self, memory_bytes: u64) -> CircuitSnapshot {
        self.snapshot_at(memory_bytes, Instant::now())
    }

    pub(crate) fn snapshot_at(&self, memory_bytes: u64, now: Instant) -> CircuitSnapshot {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.roll_window(&mut state, now);
        self.evaluate(&mut state, memory_bytes, now);
        CircuitSnapshot {
            circuit_open: state.open,
            reason: state.reason,
            current_rate: state.window_event_count,
            threshold: self.threshold,
            opened_at: state
                .opened_at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            rate_streak: state.rate_streak,
        }
    }

    fn roll_window(&self, state: &mut CircuitState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.window_start);
        if elapsed < self.window {
            return;
        }

        let window_end = state.window_start + self.window;
        if state.window_event_count > self.threshold {
            state.rate_streak += 1;
            state.below_since = None;
        } else {
            state.rate_streak = 0;
            state.below_since.get_or_insert(window_end);
        }

        // Any further whole windows passed with no events at all.
        if elapsed >= self.window * 2 {
            state.rate_streak = 0;
            state.below_since.get_or_insert(window_end);
        }

        state.window_start = now;
        state.window_event_count = 0;
    }

    fn evaluate(&self, state: &mut CircuitState, memory_bytes: u64, now: Instant) {
        if state.open {
            let recovered = state
                .below_since
                .is_some_and(|since| now.saturating_duration_since(since) >= self.recovery);
            if memory_bytes <= self.memory_soft_limit && state.rate_streak == 0 && recovered {
                tracing::info!(reason = ?state.reason, "ingest circuit closed");
                state.open = false;
                state.reason = None;
                state.opened_at = None;
            }
            return;
        }

        let reason = if state.rate_streak >= self.open_after_windows {
            Some(CircuitReason::RateExceeded)
        } else if memory_bytes > self.memory_hard_limit {
            Some(CircuitReason::MemoryExceeded)
        } else {
            None
        };

        if let Some(reason) = reason {
            tracing::warn!(
                reason = %reason,
                rate_streak = state.rate_streak,
                memory_bytes,
                "ingest circuit opened"
            );
            state.open = true;
            state.reason = Some(reason);
            state.opened_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(&IngestConfig::default())
    }

    fn start_of(breaker: &CircuitBreaker) -> Instant {
        breaker.state.lock().unwrap().window_start
    }

    #[test]
    fn threshold_is_inclusive_within_a_window() {
        let breaker = breaker();
        let t0 = start_of(&breaker);
        for _ in 0..1000 {
            assert!(breaker.admit_at(1, 0, t0).is_allowed());
        }
        let Admission::Deny(denial) = breaker.admit_at(1, 0, t0) else {
            panic!("1001st event should be denied");
        };
        assert_eq!(denial.retry_after_ms, 1000);
        assert_eq!(denial.threshold, 1000);
        assert!(!denial.circuit_open);
        assert_eq!(denial.current_rate, 1001);
    }

    #[test]
    fn new_window_resets_the_count() {
        let breaker = breaker();
        let t0 = start_of(&breaker);
        assert!(!breaker.admit_at(1500, 0, t0).is_allowed());
        assert!(
            breaker
                .admit_at(10, 0, t0 + Duration::from_millis(1001))
                .is_allowed()
        );
    }

    #[test]
    fn five_over_windows_open_the_circuit() {
        let breaker = breaker();
        let t0 = start_of(&breaker);
        let second = Duration::from_secs(1);
        for i in 0..5 {
            breaker.admit_at(1100, 0, t0 + second * i);
        }
        assert!(!breaker.snapshot_at(0, t0 + second * 4).circuit_open);

        let snapshot = breaker.snapshot_at(0, t0 + second * 5);
        assert!(snapshot.circuit_open);
        assert_eq!(snapshot.reason, Some(CircuitReason::RateExceeded));

        let Admission::Deny(denial) = breaker.admit_at(1, 0, t0 + second * 5) else {
            panic!("open circuit must deny");
        };
        assert!(denial.circuit_open);
    }

    #[test]
    fn an_under_window_breaks_the_streak() {
        let breaker = breaker();
        let t0 = start_of(&breaker);
        let second = Duration::from_secs(1);
        for i in 0..4 {
            breaker.admit_at(1100, 0, t0 + second * i);
        }
        breaker.admit_at(10, 0, t0 + second * 4);
        breaker.admit_at(1100, 0, t0 + second * 5);
        assert!(!breaker.snapshot_at(0, t0 + second * 6).circuit_open);
    }

    #[test]
    fn memory_over_hard_limit_opens_immediately() {
        let breaker = breaker();
        let Admission::Deny(denial) = breaker.admit(1, 51 * MIB) else {
            panic!("memory pressure must deny");
        };
        assert!(denial.circuit_open);
        assert_eq!(
            breaker.snapshot(51 * MIB).reason,
            Some(CircuitReason::MemoryExceeded)
        );
    }

    #[test]
    fn circuit_closes_after_recovery_below_soft_limit() {
        let breaker = breaker();
        let t0 = start_of(&breaker);
        breaker.admit_at(1, 51 * MIB, t0);

        // Memory between soft and hard keeps it open.
        let later = t0 + Duration::from_secs(30);
        assert!(breaker.snapshot_at(40 * MIB, later).circuit_open);

        // Quiet windows since t0 + 1s; recovery needs 10s of them.
        assert!(!breaker.snapshot_at(10 * MIB, later).circuit_open);
    }

    #[test]
    fn recovery_requires_continuous_quiet_time() {
        let breaker = breaker();
        let t0 = start_of(&breaker);
        let second = Duration::from_secs(1);
        for i in 0..6 {
            breaker.admit_at(1100, 0, t0 + second * i);
        }
        assert!(breaker.snapshot_at(0, t0 + second * 6).circuit_open);

        // One quiet window is not enough.
        breaker.admit_at(1, 0, t0 + second * 7);
        assert!(breaker.snapshot_at(0, t0 + second * 8).circuit_open);

        assert!(!breaker.snapshot_at(0, t0 + second * 20).circuit_open);
    }
}
