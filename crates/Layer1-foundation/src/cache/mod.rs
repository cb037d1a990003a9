//! # Anvil Cache System
//!
//! In-memory response caching placed in front of every outbound completion
//! request.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  (code, language, action)                                 │
//! │          │                                                │
//! │          ▼                                                │
//! │   cache_key()  ── SHA-256, length-prefixed fields         │
//! │          │                                                │
//! │          ▼                                                │
//! │   ResponseCache (ResponseStore)                           │
//! │   ┌─────────────────────────────────────────────────┐     │
//! │   │ TtlLruCache<String, String>                     │     │
//! │   │  - max_items bound, one LRU eviction per insert │     │
//! │   │  - lazy TTL expiry against an injected Clock    │     │
//! │   └─────────────────────────────────────────────────┘     │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Cache configuration
//! - [`response`] - Response cache service
//! - [`util`] - Utilities (TTL LRU cache, hashing)

pub mod config;
pub mod response;
pub mod util;

// Re-exports for convenience
pub use config::{ResponseCacheConfig, CACHE_MAX_ITEMS_RANGE, CACHE_TTL_MINUTES_RANGE};
pub use response::{CacheStats, ResponseCache, ResponseStore};
pub use util::{cache_key, sha256_hex, CacheEntry, CompositeKey, TtlLruCache};
