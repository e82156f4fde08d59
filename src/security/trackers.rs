use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Sliding-window limiter for assistant tool calls.
#[derive(Debug)]
pub struct ToolCallLimiter {
    /// Admission times still inside the window.
    calls: Mutex<Vec<Instant>>,
    max_calls: usize,
    window: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "Tool call rate limit exceeded ({max_calls} calls per {}s). Wait before retrying.",
    window.as_secs()
)]
pub struct ToolRateLimited {
    pub max_calls: usize,
    pub window: Duration,
}

impl ToolCallLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            max_calls,
            window,
        }
    }

    /// Admit and record one call, or refuse it without recording.
    pub fn check_and_record(&self) -> Result<(), ToolRateLimited> {
        self.check_and_record_at(Instant::now())
    }

    pub(crate) fn check_and_record_at(&self, now: Instant) -> Result<(), ToolRateLimited> {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        let cutoff = now.checked_sub(self.window);
        calls.retain(|t| cutoff.is_none_or(|cutoff| *t > cutoff));
        if calls.len() >= self.max_calls {
            return Err(ToolRateLimited {
                max_calls: self.max_calls,
                window: self.window,
            });
        }
        calls.push(now);
        Ok(())
    }

    /// Calls admitted within the current window.
    pub fn count(&self) -> usize {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cutoff) = Instant::now().checked_sub(self.window) {
            calls.retain(|t| *t > cutoff);
        }
        calls.len()
    }
}
