//! Response Cache
//!
//! Process-wide store mapping a request fingerprint to a previously obtained
//! model response. One instance per process, shared as `Arc<dyn ResponseStore>`.
//!
//! # Example
//!
//! ```rust,ignore
//! let cache = ResponseCache::new(ResponseCacheConfig::default());
//! let key = cache_key(code, "rust", "refactor");
//!
//! if let Some(reply) = cache.get(&key) {
//!     return reply;
//! }
//! let reply = provider.complete(&prompt, &params).await?;
//! cache.set(&key, reply.clone());
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::ResponseCacheConfig;
use super::util::TtlLruCache;
use crate::clock::{system_clock, SharedClock};

/// Interface boundary for response caching
pub trait ResponseStore: Send + Sync {
    /// Cached value, absent when missing, expired or caching is disabled
    fn get(&self, key: &str) -> Option<String>;

    /// Insert or overwrite; no-op when caching is disabled
    fn set(&self, key: &str, value: String);

    /// Remove every entry
    fn clear(&self);

    fn stats(&self) -> CacheStats;
}

/// Snapshot exposed to the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub item_count: usize,
    pub max_items: usize,
    pub ttl_minutes: u32,
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState {
    entries: TtlLruCache<String, String>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// TTL + LRU response cache
pub struct ResponseCache {
    config: ResponseCacheConfig,
    state: Mutex<CacheState>,
}

impl ResponseCache {
    /// Create a cache on the wall clock; config is normalized first
    pub fn new(config: ResponseCacheConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: ResponseCacheConfig, clock: SharedClock) -> Self {
        let config = config.normalized();
        let entries = TtlLruCache::new(config.max_items, config.ttl(), clock);
        Self {
            config,
            state: Mutex::new(CacheState {
                entries,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    pub fn config(&self) -> &ResponseCacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        if !self.config.enabled {
            return 0;
        }
        let removed = self.state.lock().entries.purge_expired();
        if removed > 0 {
            debug!("response cache purged {} expired entries", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseStore for ResponseCache {
    fn get(&self, key: &str) -> Option<String> {
        if !self.config.enabled {
            return None;
        }

        let mut state = self.state.lock();
        let value = state.entries.get(&key.to_string()).cloned();
        match value {
            Some(value) => {
                state.hits += 1;
                Some(value)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    fn set(&self, key: &str, value: String) {
        if !self.config.enabled {
            return;
        }

        let mut state = self.state.lock();
        let (_, evicted) = state.entries.insert(key.to_string(), value);
        if let Some(evicted) = evicted {
            state.evictions += 1;
            debug!("response cache evicted {}", short_key(&evicted));
        }
    }

    fn clear(&self) {
        self.state.lock().entries.clear();
    }

    fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            item_count: state.entries.len(),
            max_items: self.config.max_items,
            ttl_minutes: self.config.ttl_minutes,
            enabled: self.config.enabled,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn short_key(key: &str) -> &str {
    &key[..key.len().min(12)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::util::cache_key;
    use crate::clock::ManualClock;
    use chrono::Duration;
    use std::sync::Arc;

    fn cache_with(max_items: usize, ttl_minutes: u32) -> (ResponseCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let config = ResponseCacheConfig {
            enabled: true,
            max_items,
            ttl_minutes,
        };
        (ResponseCache::with_clock(config, clock.clone()), clock)
    }

    #[test]
    fn test_capacity_plus_one_evicts_least_recent() {
        let (cache, clock) = cache_with(10, 60);

        let keys: Vec<String> = (0..10).map(|i| cache_key(&format!("code {i}"), "rs", "a")).collect();
        for key in &keys {
            cache.set(key, format!("reply for {key}"));
            clock.advance(Duration::seconds(1));
        }

        // touch everything except keys[3]
        for (i, key) in keys.iter().enumerate() {
            if i != 3 {
                assert!(cache.get(key).is_some());
            }
        }

        let extra = cache_key("code 10", "rs", "a");
        cache.set(&extra, "extra".to_string());

        let stats = cache.stats();
        assert_eq!(stats.item_count, 10);
        assert_eq!(stats.evictions, 1);
        assert!(cache.get(&keys[3]).is_none());
        assert_eq!(cache.get(&extra).as_deref(), Some("extra"));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let (cache, clock) = cache_with(10, 30);
        cache.set("k", "v".to_string());

        clock.advance(Duration::minutes(29));
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        clock.advance(Duration::minutes(1));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_disabled_cache_never_stores() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = ResponseCache::with_clock(ResponseCacheConfig::disabled(), clock);

        cache.set("k", "v".to_string());
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert!(!stats.enabled);
        assert_eq!(stats.item_count, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_clear_and_stats() {
        let (cache, _) = cache_with(10, 5);
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        assert!(cache.get("a").is_some());
        assert!(cache.get("zzz").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);

        cache.clear();
        assert_eq!(cache.stats().item_count, 0);
    }

    #[test]
    fn test_config_is_normalized() {
        let (cache, _) = cache_with(1, 0);
        let stats = cache.stats();
        assert_eq!(stats.max_items, 10);
        assert_eq!(stats.ttl_minutes, 1);
    }

    #[test]
    fn test_concurrent_sets_respect_capacity() {
        let (cache, _) = cache_with(10, 60);
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let key = format!("t{t}-{i}");
                        cache.set(&key, key.clone());
                        let _ = cache.get(&key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.item_count, 10);
        // every insert beyond capacity evicted exactly one entry
        assert_eq!(stats.evictions, 8 * 50 - 10);
    }
}
