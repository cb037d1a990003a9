//! Cache utilities
//!
//! Provides caching primitives for Anvil:
//! - `TtlLruCache`: LRU cache with lazy TTL expiry
//! - `cache_key` / `CompositeKey`: SHA-256 fingerprints

mod hash;
mod lru;

pub use hash::{cache_key, sha256_hex, CompositeKey};
pub use lru::{CacheEntry, TtlLruCache};
