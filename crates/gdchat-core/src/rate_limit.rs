//! Client-side rate limiting and the clock it runs on.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of wall-clock time, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// The real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn at_millis(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    pub fn advance_millis(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or_default()
    }

    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Timestamp of the last remote workflow start.
///
/// Only remote workflows touch this; local commands never do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub last_send_ms: i64,
}

impl RateLimitState {
    pub fn new(last_send_ms: i64) -> Self {
        Self { last_send_ms }
    }

    /// Whole seconds left before another send is allowed, or `None` when the
    /// window has elapsed.
    pub fn remaining_wait_secs(&self, now_ms: i64, window_ms: i64) -> Option<u64> {
        let elapsed = now_ms - self.last_send_ms;
        if elapsed >= window_ms {
            return None;
        }
        let remaining = (window_ms - elapsed).max(0) as u64;
        Some(remaining.div_ceil(1000))
    }

    pub fn record_send(&mut self, now_ms: i64) {
        self.last_send_ms = now_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_elapsed() {
        let state = RateLimitState::new(1_000);
        assert_eq!(state.remaining_wait_secs(16_000, 15_000), None);
        assert_eq!(state.remaining_wait_secs(40_000, 15_000), None);
    }

    #[test]
    fn test_remaining_seconds_round_up() {
        let state = RateLimitState::new(0);
        assert_eq!(state.remaining_wait_secs(1, 15_000), Some(15));
        assert_eq!(state.remaining_wait_secs(5_000, 15_000), Some(10));
        assert_eq!(state.remaining_wait_secs(14_001, 15_000), Some(1));
    }

    #[test]
    fn test_fresh_state_allows_send() {
        let state = RateLimitState::default();
        let now = SystemClock.now_millis();
        assert_eq!(state.remaining_wait_secs(now, 15_000), None);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_millis(10);
        clock.advance_millis(90);
        assert_eq!(clock.now_millis(), 100);
        assert_eq!(clock.now().timestamp_millis(), 100);
    }
}
