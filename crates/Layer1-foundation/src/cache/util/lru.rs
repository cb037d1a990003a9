//! LRU Cache with TTL support
//!
//! Minimal dependencies, optimized for Anvil's response cache.
//!
//! Expiry is lazy: an entry past `expires_at` is dropped when it is looked up
//! (or by an explicit [`TtlLruCache::purge_expired`]), never by a timer.
//! Capacity eviction ignores expiry and always removes exactly one least
//! recently accessed entry.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;

use crate::clock::SharedClock;

/// A stored value with its bookkeeping timestamps
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: DateTime<Utc>,
    /// `created_at + ttl`
    pub expires_at: DateTime<Utc>,
    /// Refreshed on every successful read
    pub last_accessed_at: DateTime<Utc>,
    /// Monotonic access order; breaks ties between equal timestamps
    access_seq: u64,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// LRU cache with a fixed time-to-live per entry
pub struct TtlLruCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    max_items: usize,
    ttl: Duration,
    /// Access counter for LRU tracking
    access_counter: u64,
    clock: SharedClock,
}

impl<K: Eq + Hash + Clone, V> TtlLruCache<K, V> {
    /// Create a cache holding at most `max_items` (minimum 1)
    pub fn new(max_items: usize, ttl: Duration, clock: SharedClock) -> Self {
        let max_items = max_items.max(1);
        Self {
            entries: HashMap::with_capacity(max_items),
            max_items,
            ttl,
            access_counter: 0,
            clock,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    /// Get a value if it exists and hasn't expired
    ///
    /// A hit refreshes `last_accessed_at`; an expired entry is removed.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let now = self.clock.now();
        let expired = self.entries.get(key)?.is_expired(now);

        if expired {
            self.entries.remove(key);
            return None;
        }

        let seq = self.next_seq();
        let entry = self.entries.get_mut(key)?;
        entry.last_accessed_at = now;
        entry.access_seq = seq;
        Some(&entry.value)
    }

    /// Look at an entry without touching its access time
    pub fn peek(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    /// Insert or overwrite a value
    ///
    /// Overwriting restarts the entry's TTL. Inserting a new key at capacity
    /// first evicts the single least recently accessed entry, which is
    /// returned as the second element.
    pub fn insert(&mut self, key: K, value: V) -> (Option<V>, Option<K>) {
        let now = self.clock.now();
        let seq = self.next_seq();
        let expires_at = now + self.ttl;

        if let Some(entry) = self.entries.get_mut(&key) {
            let old_value = std::mem::replace(&mut entry.value, value);
            entry.created_at = now;
            entry.expires_at = expires_at;
            entry.last_accessed_at = now;
            entry.access_seq = seq;
            return (Some(old_value), None);
        }

        let evicted = if self.entries.len() >= self.max_items {
            self.evict_lru()
        } else {
            None
        };

        self.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at,
                last_accessed_at: now,
                access_seq: seq,
            },
        );

        (None, evicted)
    }

    /// Remove a specific key
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Remove expired entries, returning how many were dropped
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        before - self.entries.len()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries (including not yet purged expired ones)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_items
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Evict the least recently used entry
    fn evict_lru(&mut self) -> Option<K> {
        let lru_key = self.find_lru_key()?;
        self.entries.remove(&lru_key);
        Some(lru_key)
    }

    /// Find the key with the oldest access
    fn find_lru_key(&self) -> Option<K> {
        self.entries
            .iter()
            .min_by_key(|(_, e)| e.access_seq)
            .map(|(k, _)| k.clone())
    }
}

impl<K, V> std::fmt::Debug for TtlLruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlLruCache")
            .field("len", &self.entries.len())
            .field("max_items", &self.max_items)
            .field("ttl", &self.ttl)
            .finish()
    }
}
