//! Response cache.
//!
//! # Responsibilities
//! - Memoize successful results of idempotent operations
//! - Never serve an entry past its TTL
//! - Bound memory with least-recently-used eviction
//!
//! # Design Decisions
//! - Shared across services, keyed by (service, operation, params)
//! - Sharded by key hash; each shard is a mutex-guarded LRU, so writers
//!   only serialize within a shard
//! - Expired entries are evicted lazily on lookup
//! - Capacity is split across shards so the shard sizes sum to exactly the
//!   configured capacity. LRU order is exact per shard, so a full shard can
//!   evict while other shards still have room

mod key;

pub use key::CacheKey;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::services::Payload;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Payload,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) < self.ttl
    }
}

/// Statistics for cache performance monitoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Current number of entries (expired entries not yet evicted included).
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    /// Entries pushed out by capacity pressure.
    pub evictions: u64,
    /// Entries removed because their TTL had passed.
    pub expirations: u64,
}

impl CacheStats {
    /// Hits over total lookups, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

/// Sharded TTL + LRU response cache.
pub struct ResponseCache {
    shards: Vec<Mutex<LruCache<CacheKey, CacheEntry>>>,
    capacity: usize,
    counters: Counters,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = config.capacity.max(1);
        // Every shard holds at least one entry.
        let shard_count = config.shards.clamp(1, capacity);
        let base = capacity / shard_count;
        let remainder = capacity % shard_count;

        let shards = (0..shard_count)
            .map(|i| {
                let size = base + usize::from(i < remainder);
                let size = NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN);
                Mutex::new(LruCache::new(size))
            })
            .collect();

        Self {
            shards,
            capacity,
            counters: Counters::default(),
        }
    }

    /// Look up a fresh entry. An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Payload> {
        let now = Instant::now();
        let mut shard = self.shard(key).lock();

        let lookup = shard
            .get(key)
            .map(|entry| entry.is_fresh(now).then(|| entry.payload.clone()));

        match lookup {
            Some(Some(payload)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(payload)
            }
            Some(None) => {
                shard.pop(key);
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %key, "Cache entry expired");
                None
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `payload` under `key` for `ttl`. A zero TTL stores nothing.
    pub fn put(&self, key: CacheKey, payload: Payload, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        let entry = CacheEntry {
            payload,
            inserted_at: Instant::now(),
            ttl,
        };

        let mut shard = self.shard(&key).lock();
        let displaced = shard.push(key.clone(), entry);
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);

        if let Some((evicted, _)) = displaced {
            if evicted != key {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %evicted, "Cache entry evicted");
            }
        }
    }

    pub fn remove(&self, key: &CacheKey) -> Option<Payload> {
        self.shard(key).lock().pop(key).map(|entry| entry.payload)
    }

    /// Drop every entry belonging to `service`.
    pub fn invalidate_service(&self, service: &str) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.lock();
            let keys: Vec<CacheKey> = shard
                .iter()
                .filter(|(k, _)| k.service() == service)
                .map(|(k, _)| k.clone())
                .collect();
            for key in keys {
                shard.pop(&key);
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries currently held for `service`.
    pub fn len_for_service(&self, service: &str) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().iter().filter(|(k, _)| k.service() == service).count())
            .sum()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
        }
    }

    fn shard(&self, key: &CacheKey) -> &Mutex<LruCache<CacheKey, CacheEntry>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("shards", &self.shards.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
