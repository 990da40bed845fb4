// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Per-user clearnode client cache.
//!
//! Authenticated clients are cached under `user_id-chain-address` so repeat
//! operations skip the auth handshake. The cache is LRU-bounded, and entries
//! are evicted explicitly when the clearnode reports the session expired.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use super::rpc::NitroliteClient;

/// Default number of cached clients.
const DEFAULT_CAPACITY: usize = 256;

/// Cache key: `user_id-chain-address`.
pub fn client_key(user_id: &str, chain: &str, address: &str) -> String {
    format!("{user_id}-{chain}-{address}")
}

/// LRU cache of authenticated clearnode clients.
pub struct ClientCache {
    inner: Mutex<LruCache<String, Arc<NitroliteClient>>>,
}

impl ClientCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY).expect("nonzero default"));
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<NitroliteClient>> {
        self.inner.lock().expect("cache lock").get(key).cloned()
    }

    pub fn insert(&self, key: String, client: Arc<NitroliteClient>) {
        self.inner.lock().expect("cache lock").put(key, client);
    }

    /// Drop a cached client (on detected session expiry).
    pub fn evict(&self, key: &str) {
        self.inner.lock().expect("cache lock").pop(key);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClientCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_key_format_is_stable() {
        assert_eq!(
            client_key("user-1", "sepolia", "0xAbC"),
            "user-1-sepolia-0xAbC"
        );
    }

    #[test]
    fn cache_starts_empty() {
        let cache = ClientCache::new(4);
        assert!(cache.is_empty());
        assert!(cache.get("user-1-sepolia-0xabc").is_none());
    }

    #[test]
    fn evict_is_a_noop_on_missing_keys() {
        let cache = ClientCache::new(4);
        cache.evict("never-inserted");
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_falls_back_to_default() {
        // NonZeroUsize rejects 0; the cache must still be usable.
        let cache = ClientCache::new(0);
        assert!(cache.is_empty());
    }
}
