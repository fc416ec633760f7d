//! Per-address request throttle.
//!
//! One request per source address is allowed per window. Entries are kept in a
//! concurrent map and evicted by [`RateLimiter::sweep`], which the server runs
//! on a timer.

use std::time::{Duration, Instant};

use dashmap::{mapref::entry::Entry, DashMap};

/// Default throttle window applied to contact and proxy submissions.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    entries: DashMap<String, Instant>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: DashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` and records the attempt when `address` has no allowed
    /// request inside the current window.
    pub fn allow(&self, address: &str) -> bool {
        self.allow_at(address, Instant::now())
    }

    /// Same as [`allow`](Self::allow) with an explicit clock reading.
    pub fn allow_at(&self, address: &str, now: Instant) -> bool {
        match self.entries.entry(address.to_string()) {
            Entry::Occupied(mut entry) => {
                if now.saturating_duration_since(*entry.get()) < self.window {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Drops every entry whose last allowed request is older than the window.
    /// Returns the number of evicted addresses.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, last| now.saturating_duration_since(*last) < self.window);
        before.saturating_sub(self.entries.len())
    }

    /// Number of addresses currently tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_is_always_allowed() {
        let limiter = RateLimiter::default();
        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.2"));
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn test_second_call_within_window_is_rejected() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.allow_at("10.0.0.1", t0));
        assert!(!limiter.allow_at("10.0.0.1", t0 + Duration::from_secs(59)));
    }

    #[test]
    fn test_calls_further_apart_than_window_are_both_allowed() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.allow_at("10.0.0.1", t0));
        assert!(limiter.allow_at("10.0.0.1", t0 + Duration::from_secs(61)));
    }

    #[test]
    fn test_rejected_call_does_not_extend_the_block() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.allow_at("10.0.0.1", t0));
        assert!(!limiter.allow_at("10.0.0.1", t0 + Duration::from_secs(30)));
        assert!(limiter.allow_at("10.0.0.1", t0 + Duration::from_secs(60)));
    }

    #[test]
    fn test_sweep_evicts_only_expired_entries() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let t0 = Instant::now();
        limiter.allow_at("old", t0);
        limiter.allow_at("fresh", t0 + Duration::from_secs(50));

        let removed = limiter.sweep_at(t0 + Duration::from_secs(70));
        assert_eq!(removed, 1);
        assert_eq!(limiter.len(), 1);
        assert!(!limiter.allow_at("fresh", t0 + Duration::from_secs(70)));
        assert!(limiter.allow_at("old", t0 + Duration::from_secs(70)));
    }
}
