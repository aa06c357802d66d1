//! Records persisted by the usage store and the rate window rules

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// A provisioned API key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeyRecord {
    pub key: String,
    pub owner: String,
    pub rate_limit_per_minute: u32,
    pub created_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    /// Short, log-safe form of the key
    pub fn key_prefix(&self) -> &str {
        key_prefix(&self.key)
    }
}

/// First few characters of a key, for logs
pub fn key_prefix(key: &str) -> &str {
    match key.char_indices().nth(6) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    /// Requests admitted in the active window, including this one if allowed
    pub current_count: u32,
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitStatus {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.current_count)
    }
}

/// Outcome of a single admission attempt against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub record: ApiKeyRecord,
    pub status: RateLimitStatus,
    /// Usage counter after this attempt. Unchanged when the attempt was rejected.
    pub total_requests: u64,
}

/// Fixed window anchored at the first request admitted after the previous
/// window expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub started_at: DateTime<Utc>,
    pub count: u32,
}

impl RateWindow {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self { started_at: now, count: 0 }
    }

    pub fn resets_at(&self, length: Duration) -> DateTime<Utc> {
        self.started_at + to_chrono(length)
    }

    pub fn is_expired(&self, now: DateTime<Utc>, length: Duration) -> bool {
        now >= self.resets_at(length)
    }

    /// Apply one request attempt to an optional stored window.
    ///
    /// Returns the window to store back and the resulting status. A rejected
    /// attempt leaves the count untouched.
    pub fn admit(
        current: Option<RateWindow>,
        now: DateTime<Utc>,
        limit: u32,
        length: Duration,
    ) -> (RateWindow, RateLimitStatus) {
        let mut window = match current {
            Some(window) if !window.is_expired(now, length) => window,
            _ => RateWindow::fresh(now),
        };

        let allowed = window.count < limit;
        if allowed {
            window.count += 1;
        }

        let status = RateLimitStatus {
            allowed,
            current_count: window.count,
            limit,
            reset_at: window.resets_at(length),
        };

        (window, status)
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(duration.as_millis() as i64)
}
