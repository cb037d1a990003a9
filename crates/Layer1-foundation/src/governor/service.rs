//! Request governor service

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use super::window::{RateLimitWindow, WindowSnapshot};
use crate::clock::{system_clock, SharedClock};
use crate::{Error, Result};

/// Caller context the governor counts against
///
/// Single-user callers use [`ContextId::global`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(String);

impl ContextId {
    pub const GLOBAL: &'static str = "global";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn global() -> Self {
        Self::new(Self::GLOBAL)
    }

    /// Fresh random context
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Governor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernorConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests_per_window: u32,

    #[serde(default = "default_window_length_ms")]
    pub window_length_ms: u64,
}

fn default_max_requests() -> u32 {
    10
}
fn default_window_length_ms() -> u64 {
    60_000
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_requests_per_window: default_max_requests(),
            window_length_ms: default_window_length_ms(),
        }
    }
}

impl GovernorConfig {
    pub fn new(max_requests_per_window: u32, window_length_ms: u64) -> Self {
        Self {
            max_requests_per_window,
            window_length_ms,
        }
    }

    /// At least one request per window, windows at least 1ms long
    pub fn normalized(&self) -> Self {
        Self {
            max_requests_per_window: self.max_requests_per_window.max(1),
            window_length_ms: self.window_length_ms.clamp(1, i64::MAX as u64),
        }
    }

    pub fn window_length(&self) -> Duration {
        Duration::milliseconds(self.window_length_ms.min(i64::MAX as u64) as i64)
    }
}

/// Admission control boundary
pub trait AdmissionControl: Send + Sync {
    /// Count one request against `context` if the window has room
    fn try_admit(&self, context: &ContextId) -> bool;

    /// Read-only view of the context's current window
    fn window(&self, context: &ContextId) -> WindowSnapshot;

    /// [`try_admit`](Self::try_admit) as a `Result`
    fn admit(&self, context: &ContextId) -> Result<()> {
        if self.try_admit(context) {
            return Ok(());
        }
        let snapshot = self.window(context);
        Err(Error::rate_limited(context.as_str(), snapshot.retry_after()))
    }
}

/// Fixed-window rate limiter keyed by [`ContextId`]
pub struct RequestGovernor {
    config: GovernorConfig,
    clock: SharedClock,
    windows: Mutex<HashMap<ContextId, RateLimitWindow>>,
}

impl RequestGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: GovernorConfig, clock: SharedClock) -> Self {
        Self {
            config: config.normalized(),
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Snapshots of every tracked context, sorted by id
    pub fn windows(&self) -> Vec<WindowSnapshot> {
        let now = self.clock.now();
        let windows = self.windows.lock();
        let mut ids: Vec<&ContextId> = windows.keys().collect();
        ids.sort();
        ids.into_iter()
            .map(|id| self.snapshot(id, windows.get(id), now))
            .collect()
    }

    /// Forget the window of one context
    pub fn reset(&self, context: &ContextId) {
        self.windows.lock().remove(context);
    }

    /// Drop windows that have elapsed, returning how many were removed
    pub fn prune_idle(&self) -> usize {
        let now = self.clock.now();
        let length = self.config.window_length();
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| !w.is_elapsed(now, length));
        before - windows.len()
    }

    fn snapshot(
        &self,
        context: &ContextId,
        window: Option<&RateLimitWindow>,
        now: DateTime<Utc>,
    ) -> WindowSnapshot {
        let limit = self.config.max_requests_per_window;
        let length = self.config.window_length();

        match window {
            Some(w) if !w.is_elapsed(now, length) => {
                let remaining = limit.saturating_sub(w.count);
                let resets_at = w.resets_at(length);
                let retry_after_ms = if remaining == 0 {
                    (resets_at - now).num_milliseconds().max(0) as u64
                } else {
                    0
                };
                WindowSnapshot {
                    context: context.to_string(),
                    count: w.count,
                    limit,
                    remaining,
                    window_start: Some(w.window_start),
                    resets_at: Some(resets_at),
                    retry_after_ms,
                }
            }
            // untracked or elapsed: the next check starts fresh
            _ => WindowSnapshot {
                context: context.to_string(),
                count: 0,
                limit,
                remaining: limit,
                window_start: None,
                resets_at: None,
                retry_after_ms: 0,
            },
        }
    }
}

impl AdmissionControl for RequestGovernor {
    fn try_admit(&self, context: &ContextId) -> bool {
        let now = self.clock.now();
        let length = self.config.window_length();
        let limit = self.config.max_requests_per_window;

        let mut windows = self.windows.lock();
        let window = windows
            .entry(context.clone())
            .or_insert_with(|| RateLimitWindow::new(now));

        if window.roll(now, length) {
            debug!("rate limit window reset for {}", context);
        }

        if window.count < limit {
            window.count += 1;
            true
        } else {
            debug!(
                "rate limit reached for {} ({}/{})",
                context, window.count, limit
            );
            false
        }
    }

    fn window(&self, context: &ContextId) -> WindowSnapshot {
        let now = self.clock.now();
        let windows = self.windows.lock();
        self.snapshot(context, windows.get(context), now)
    }
}

impl fmt::Debug for RequestGovernor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestGovernor")
            .field("config", &self.config)
            .field("contexts", &self.windows.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn governor(max: u32, window_ms: u64) -> (RequestGovernor, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let governor =
            RequestGovernor::with_clock(GovernorConfig::new(max, window_ms), clock.clone());
        (governor, clock)
    }

    #[test]
    fn test_fills_rejects_and_resets() {
        let (governor, clock) = governor(3, 1000);
        let ctx = ContextId::global();

        assert!(governor.try_admit(&ctx));
        assert!(governor.try_admit(&ctx));
        assert!(governor.try_admit(&ctx));
        assert!(!governor.try_admit(&ctx));

        clock.advance_ms(999);
        assert!(!governor.try_admit(&ctx));

        clock.advance_ms(1);
        assert!(governor.try_admit(&ctx));
        assert_eq!(governor.window(&ctx).count, 1);
    }

    #[test]
    fn test_contexts_are_independent() {
        let (governor, _) = governor(1, 1000);
        let a = ContextId::new("editor-a");
        let b = ContextId::new("editor-b");

        assert!(governor.try_admit(&a));
        assert!(!governor.try_admit(&a));
        assert!(governor.try_admit(&b));
    }

    #[test]
    fn test_window_snapshot_and_retry_after() {
        let (governor, clock) = governor(2, 10_000);
        let ctx = ContextId::new("ctx");

        let fresh = governor.window(&ctx);
        assert_eq!(fresh.remaining, 2);
        assert!(fresh.resets_at.is_none());

        governor.try_admit(&ctx);
        governor.try_admit(&ctx);
        clock.advance_ms(4_000);

        let snap = governor.window(&ctx);
        assert!(snap.is_exhausted());
        assert_eq!(snap.count, 2);
        assert_eq!(snap.retry_after_ms, 6_000);

        let err = governor.admit(&ctx).unwrap_err();
        assert_eq!(err.retry_after(), Some(std::time::Duration::from_millis(6_000)));
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let (governor, clock) = governor(1, 100);
        let ctx = ContextId::global();
        governor.try_admit(&ctx);
        clock.advance_ms(150);

        assert_eq!(governor.window(&ctx).count, 0);
        assert_eq!(governor.windows().len(), 1);
        assert_eq!(governor.prune_idle(), 1);
        assert!(governor.windows().is_empty());
    }

    #[test]
    fn test_config_normalized() {
        let config = GovernorConfig::new(0, 0).normalized();
        assert_eq!(config.max_requests_per_window, 1);
        assert_eq!(config.window_length_ms, 1);
    }

    #[test]
    fn test_concurrent_admissions_are_exact() {
        let (governor, _) = governor(100, 60_000);
        let governor = Arc::new(governor);
        let ctx = ContextId::global();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let governor = Arc::clone(&governor);
                let ctx = ctx.clone();
                std::thread::spawn(move || (0..50).filter(|_| governor.try_admit(&ctx)).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(admitted, 100);
        assert_eq!(governor.window(&ctx).count, 100);
    }
}
