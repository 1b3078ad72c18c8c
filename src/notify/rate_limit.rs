//! Per-player delivery throttling and duplicate suppression.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::message::DedupKey;

/// Sliding-window rate limiter keyed by player id.
///
/// Each accepted delivery reserves a timestamp; a player is at the limit
/// while `max_requests` timestamps fall inside the trailing window.
pub struct RateLimiter {
    /// Player -> delivery timestamps inside the window, oldest first
    entries: DashMap<String, VecDeque<DateTime<Utc>>>,
    /// Max deliveries per window
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::seconds(60))
    }

    fn evict(window: Duration, stamps: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
        while let Some(oldest) = stamps.front() {
            if now - *oldest >= window {
                stamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Deliveries counted in the trailing window
    pub fn count(&self, player_id: &str, now: DateTime<Utc>) -> u32 {
        match self.entries.get_mut(player_id) {
            Some(mut stamps) => {
                Self::evict(self.window, &mut stamps, now);
                stamps.len() as u32
            }
            None => 0,
        }
    }

    pub fn is_limited(&self, player_id: &str, now: DateTime<Utc>) -> bool {
        self.count(player_id, now) >= self.max_requests
    }

    /// Reserve a delivery slot. Returns true if allowed, false if rate limited.
    pub fn try_acquire(&self, player_id: &str, now: DateTime<Utc>) -> bool {
        let mut stamps = self.entries.entry(player_id.to_string()).or_default();
        Self::evict(self.window, &mut stamps, now);

        if stamps.len() as u32 >= self.max_requests {
            return false;
        }
        stamps.push_back(now);
        true
    }

    /// Give back a slot reserved at `at` (the delivery did not happen)
    pub fn release(&self, player_id: &str, at: DateTime<Utc>) {
        if let Some(mut stamps) = self.entries.get_mut(player_id) {
            if let Some(pos) = stamps.iter().rposition(|t| *t == at) {
                stamps.remove(pos);
            }
        }
    }

    /// Remove players with no deliveries inside the window
    pub fn cleanup(&self, now: DateTime<Utc>) {
        let window = self.window;
        self.entries.retain(|_, stamps| {
            Self::evict(window, stamps, now);
            !stamps.is_empty()
        });
    }
}

/// Remembers recently accepted messages per player so identical ones
/// inside the window are suppressed.
pub struct DuplicateFilter {
    entries: DashMap<String, VecDeque<(DedupKey, DateTime<Utc>)>>,
    window: Duration,
}

impl DuplicateFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            window,
        }
    }

    /// Returns true if `key` was already seen inside the window; otherwise
    /// remembers it and returns false.
    pub fn check_and_mark(&self, player_id: &str, key: &DedupKey, now: DateTime<Utc>) -> bool {
        let mut seen = self.entries.entry(player_id.to_string()).or_default();
        let window = self.window;
        seen.retain(|(_, at)| now - *at < window);

        if seen.iter().any(|(k, _)| k == key) {
            return true;
        }
        seen.push_back((key.clone(), now));
        false
    }

    /// Forget a key (its message was never delivered)
    pub fn forget(&self, player_id: &str, key: &DedupKey) {
        if let Some(mut seen) = self.entries.get_mut(player_id) {
            seen.retain(|(k, _)| k != key);
        }
    }

    pub fn cleanup(&self, now: DateTime<Utc>) {
        let window = self.window;
        self.entries.retain(|_, seen| {
            seen.retain(|(_, at)| now - *at < window);
            !seen.is_empty()
        });
    }
}
