//! Generation-tagged resolution cache
//!
//! Every entry remembers the store generation it was computed at. A lookup
//! with a different current generation is a miss, so a committed write is
//! visible to the very next resolution regardless of TTL.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::EffectivePermissions;
use crate::types::UserId;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached users
    pub capacity: usize,

    /// Time-to-live for cached permission sets
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
struct CachedEntry {
    permissions: EffectivePermissions,
    generation: u64,
    cached_at: Instant,
}

impl CachedEntry {
    fn new(permissions: EffectivePermissions, generation: u64) -> Self {
        Self {
            permissions,
            generation,
            cached_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Per-user effective permission cache
pub struct ResolutionCache {
    entries: Arc<DashMap<UserId, CachedEntry>>,
    config: CacheConfig,
    stats: Arc<DashMap<&'static str, usize>>,
}

impl ResolutionCache {
    /// Create a new cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            config,
            stats: Arc::new(DashMap::new()),
        }
    }

    /// Cached set for `user_id` if it was computed at `generation` and is still fresh
    pub fn get(&self, user_id: &UserId, generation: u64) -> Option<EffectivePermissions> {
        if let Some(entry) = self.entries.get(user_id) {
            if entry.generation != generation {
                drop(entry);
                self.entries.remove(user_id);
                self.increment_stat("stale");
                self.increment_stat("misses");
                return None;
            }

            if entry.is_expired(self.config.ttl) {
                drop(entry);
                self.entries.remove(user_id);
                self.increment_stat("expirations");
                self.increment_stat("misses");
                return None;
            }

            self.increment_stat("hits");
            return Some(entry.permissions.clone());
        }

        self.increment_stat("misses");
        None
    }

    /// Store a set computed at `generation`
    pub fn put(&self, user_id: UserId, generation: u64, permissions: EffectivePermissions) {
        if self.config.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.config.capacity && !self.entries.contains_key(&user_id) {
            self.evict();
        }
        self.entries
            .insert(user_id, CachedEntry::new(permissions, generation));
    }

    /// Drop one user's entry
    pub fn invalidate(&self, user_id: &UserId) {
        self.entries.remove(user_id);
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.entries.clear();
        self.stats.clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            expirations: self.get_stat("expirations"),
            stale: self.get_stat("stale"),
            entries: self.entries.len(),
            max_entries: self.config.capacity,
        }
    }

    /// Evict expired entries, then up to 10% of the rest
    fn evict(&self) {
        let ttl = self.config.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl));
        if self.entries.len() < self.config.capacity {
            return;
        }

        let to_remove = (self.config.capacity / 10).max(1);
        let mut removed = 0;
        self.entries.retain(|_, _| {
            if removed < to_remove {
                removed += 1;
                false
            } else {
                true
            }
        });
    }

    fn increment_stat(&self, key: &'static str) {
        *self.stats.entry(key).or_insert(0) += 1;
    }

    fn get_stat(&self, key: &'static str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    /// Misses caused by a newer store generation
    pub stale: usize,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
