//! Fixed-window rate limiter keyed by actor.
//!
//! ```text
//! window = 60s, limit = 3
//!
//! t=0s   hit  → count 1  ok
//! t=10s  hit  → count 2  ok
//! t=20s  hit  → count 3  ok
//! t=30s  hit  → rejected, retry after 30s
//! t=60s  hit  → window expired, evicted, count 1  ok
//! ```
//!
//! Expired windows are evicted on every check, so the map only holds actors
//! seen within the last window.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{QueueError, QueueResult};

/// Limit configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum hits per window
    pub limit: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 30,
            window_secs: 60,
        }
    }
}

struct Window {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Fixed-window counter per key.
pub struct FixedWindowLimiter {
    name: String,
    config: RateLimitConfig,
    windows: Mutex<HashMap<i64, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(name: impl Into<String>, config: RateLimitConfig) -> Self {
        Self {
            name: name.into(),
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    fn window(&self) -> Duration {
        Duration::seconds(i64::try_from(self.config.window_secs).unwrap_or(i64::MAX))
    }

    /// Count one hit for `key` at `now`.
    ///
    /// # Errors
    ///
    /// `RateLimited` when the key already used up its window.
    pub fn check(&self, key: i64, now: DateTime<Utc>) -> QueueResult<()> {
        let window = self.window();
        let mut windows = self.windows.lock()?;

        windows.retain(|_, w| now - w.started_at < window);

        let entry = windows.entry(key).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if entry.count >= self.config.limit {
            let remaining = window - (now - entry.started_at);
            let retry_after_secs = u64::try_from(remaining.num_seconds().max(1)).unwrap_or(1);
            warn!(
                limiter = %self.name,
                key,
                retry_after_secs,
                "Rate limit exceeded"
            );
            return Err(QueueError::RateLimited { retry_after_secs });
        }

        entry.count += 1;
        Ok(())
    }

    /// Number of keys with a live window.
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}
