//! In-memory TTL cache for report responses.
//!
//! Entries are JSON payloads keyed by a hash of the request shape. Expiry is
//! lazy: expired entries are dropped on the next lookup, there is no sweeper
//! task. The cache is owned by the application state and injected into
//! handlers, never a process-wide global.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Concurrent response cache with per-entry expiry.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    default_ttl: Duration,
    enabled: bool,
}

impl ResponseCache {
    pub fn new(default_ttl: Duration, enabled: bool) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a key, dropping it if it has expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        // The read guard from `get` must be dropped before `remove`, or the
        // two calls deadlock on the same shard lock.
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            drop(self.entries.remove(key));
        }
        None
    }

    pub fn insert(&self, key: String, value: Value) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: String, value: Value, ttl: Duration) {
        if !self.enabled {
            return;
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build a cache key from a route prefix and the request parameters that
/// shape the response. Hashing keeps keys bounded regardless of filter size.
pub fn cache_key(prefix: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{}:{:x}", prefix, hasher.finalize())
}
