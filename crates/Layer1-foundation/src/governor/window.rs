//! Rate limit window

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Fixed window counter with lazy reset
///
/// A window opens at the first check and resets the first time a check
/// happens with `now - window_start >= length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

impl RateLimitWindow {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    pub fn is_elapsed(&self, now: DateTime<Utc>, length: Duration) -> bool {
        now - self.window_start >= length
    }

    /// Reset when the window has elapsed; returns whether it did
    pub fn roll(&mut self, now: DateTime<Utc>, length: Duration) -> bool {
        if self.is_elapsed(now, length) {
            self.count = 0;
            self.window_start = now;
            true
        } else {
            false
        }
    }

    pub fn resets_at(&self, length: Duration) -> DateTime<Utc> {
        self.window_start + length
    }
}

/// Read-only view of one context's window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSnapshot {
    pub context: String,
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    /// Absent until the context's first request
    pub window_start: Option<DateTime<Utc>>,
    pub resets_at: Option<DateTime<Utc>>,
    /// Zero while admissions remain
    pub retry_after_ms: u64,
}

impl WindowSnapshot {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn retry_after(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retry_after_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roll_at_boundary() {
        let start = Utc::now();
        let length = Duration::milliseconds(1000);
        let mut window = RateLimitWindow::new(start);
        window.count = 5;

        assert!(!window.roll(start + Duration::milliseconds(999), length));
        assert_eq!(window.count, 5);

        let later = start + length;
        assert!(window.roll(later, length));
        assert_eq!(window.count, 0);
        assert_eq!(window.window_start, later);
    }
}
