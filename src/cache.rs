//! Response cache keyed by request fingerprint, with TTL expiry and
//! oldest-first eviction.
//!
//! Eviction is by creation time, not recency of use: when the cache is full,
//! the single oldest entry goes, regardless of how often it was read. Expired
//! entries are removed lazily on lookup.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::model::OptimizationResponse;

/// Configuration for the optimization cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached responses
    pub max_entries: usize,
    /// TTL for cached responses, measured from insertion
    pub ttl: Duration,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            ttl: Duration::from_secs(2 * 60 * 60), // 2 hours
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// A single cached response.
#[derive(Debug)]
struct CacheEntry {
    response: OptimizationResponse,
    created_at: Instant,
}

/// Statistics about cache performance.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub total_entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Fingerprint-keyed response cache shared by all engine callers.
pub struct OptimizationCache {
    config: CacheConfig,
    entries: RwLock<HashMap<u64, CacheEntry>>,
    stats: RwLock<CacheStats>,
}

impl OptimizationCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Look up a cached response. Expired entries are removed and count as
    /// misses.
    pub fn get(&self, key: u64) -> Option<OptimizationResponse> {
        if !self.config.enabled {
            return None;
        }

        let mut entries = self.entries.write();
        match entries.get(&key) {
            Some(entry) => {
                if entry.created_at.elapsed() > self.config.ttl {
                    entries.remove(&key);
                    let mut stats = self.stats.write();
                    stats.expirations += 1;
                    stats.misses += 1;
                    stats.total_entries = entries.len();
                    None
                } else {
                    let response = entry.response.clone();
                    self.stats.write().hits += 1;
                    Some(response)
                }
            }
            None => {
                self.stats.write().misses += 1;
                None
            }
        }
    }

    /// Store a response under the given fingerprint.
    pub fn put(&self, key: u64, response: &OptimizationResponse) {
        if !self.config.enabled {
            return;
        }

        let mut entries = self.entries.write();

        if !entries.contains_key(&key) {
            while entries.len() >= self.config.max_entries.max(1) {
                if !self.evict_oldest(&mut entries) {
                    break;
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                response: response.clone(),
                created_at: Instant::now(),
            },
        );
        self.stats.write().total_entries = entries.len();
    }

    /// Remove the entry with the earliest creation time. The scan runs under
    /// the caller's write lock, so it sees a consistent view.
    fn evict_oldest(&self, entries: &mut HashMap<u64, CacheEntry>) -> bool {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.created_at)
            .map(|(key, _)| *key);

        match oldest {
            Some(key) => {
                entries.remove(&key);
                self.stats.write().evictions += 1;
                true
            }
            None => false,
        }
    }

    /// Drop all entries.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        self.stats.write().total_entries = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}
