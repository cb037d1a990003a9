//! Hashing utilities for cache keys
//!
//! Keys are SHA-256 digests rendered as lower-case hex. Every component is
//! length-prefixed before hashing, so `("ab", "c")` and `("a", "bc")` never
//! produce the same input stream.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of raw bytes
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fingerprint of a completion request
///
/// Each field is trimmed; internal content is hashed verbatim. Same triple
/// always yields the same key.
pub fn cache_key(code: &str, language: &str, action: &str) -> String {
    let mut key = CompositeKey::new();
    key.push_str(code.trim());
    key.push_str(language.trim());
    key.push_str(action.trim());
    key.finalize()
}

/// A cache key combining multiple string components
#[derive(Debug, Clone)]
pub struct CompositeKey {
    hasher: Sha256,
    components: usize,
}

impl CompositeKey {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            components: 0,
        }
    }

    /// Append one component as `<len as u64 BE><bytes>`
    pub fn push_str(&mut self, s: &str) {
        self.hasher.update((s.len() as u64).to_be_bytes());
        self.hasher.update(s.as_bytes());
        self.components += 1;
    }

    pub fn len(&self) -> usize {
        self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components == 0
    }

    /// Build the hex digest of all components
    pub fn finalize(self) -> String {
        let mut hasher = self.hasher;
        // component count closes the stream
        hasher.update((self.components as u64).to_be_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Default for CompositeKey {
    fn default() -> Self {
        Self::new()
    }
}
