//! Bounded, time-limited memoization of knowledge lookups.
//!
//! Each cached result is stamped with the corpus version it was computed
//! against. A lookup for a newer version treats the entry as a miss, so a
//! cached result never outlives a learning event.

use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::base::KnowledgeMatch;

/// Default number of distinct request shapes kept.
pub const DEFAULT_CAPACITY: usize = 100;
/// Default lifetime of a cached lookup.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CachedLookup {
    matches: Vec<KnowledgeMatch>,
    version: u64,
    stored_at: Instant,
    last_used: u64,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// LRU cache of match lists keyed by request shape.
pub struct MatchCache {
    entries: HashMap<String, CachedLookup>,
    capacity: usize,
    ttl: Duration,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl MatchCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity: capacity.max(1),
            ttl,
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a key computed against `version`.
    pub fn get(&mut self, key: &str, version: u64) -> Option<Vec<KnowledgeMatch>> {
        self.get_at(key, version, Instant::now())
    }

    pub(crate) fn get_at(&mut self, key: &str, version: u64, now: Instant) -> Option<Vec<KnowledgeMatch>> {
        self.tick += 1;
        let tick = self.tick;

        let usable = match self.entries.get(key) {
            Some(cached) => {
                cached.version == version && now.saturating_duration_since(cached.stored_at) < self.ttl
            }
            None => {
                self.misses += 1;
                return None;
            }
        };

        if !usable {
            self.entries.remove(key);
            self.misses += 1;
            return None;
        }

        self.hits += 1;
        self.entries.get_mut(key).map(|cached| {
            cached.last_used = tick;
            cached.matches.clone()
        })
    }

    /// Store a result, evicting the least recently used key when full.
    pub fn insert(&mut self, key: String, version: u64, matches: Vec<KnowledgeMatch>) {
        self.insert_at(key, version, matches, Instant::now());
    }

    pub(crate) fn insert_at(&mut self, key: String, version: u64, matches: Vec<KnowledgeMatch>, now: Instant) {
        self.tick += 1;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_one(now);
        }
        self.entries.insert(
            key,
            CachedLookup {
                matches,
                version,
                stored_at: now,
                last_used: self.tick,
            },
        );
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
        }
    }

    // Expired entries go first; otherwise the least recently used one.
    fn evict_one(&mut self, now: Instant) {
        let ttl = self.ttl;
        let expired = self
            .entries
            .iter()
            .find(|(_, c)| now.saturating_duration_since(c.stored_at) >= ttl)
            .map(|(k, _)| k.clone());

        let victim = expired.or_else(|| {
            self.entries
                .iter()
                .min_by_key(|(_, c)| c.last_used)
                .map(|(k, _)| k.clone())
        });

        if let Some(key) = victim {
            self.entries.remove(&key);
        }
    }
}

impl Default for MatchCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_ttl() {
        let mut cache = MatchCache::default();
        let now = Instant::now();
        cache.insert_at("k".into(), 1, Vec::new(), now);
        assert!(cache.get_at("k", 1, now + Duration::from_secs(299)).is_some());
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_expired_is_miss() {
        let mut cache = MatchCache::default();
        let now = Instant::now();
        cache.insert_at("k".into(), 1, Vec::new(), now);
        assert!(cache.get_at("k", 1, now + Duration::from_secs(300)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_version_bump_is_miss() {
        let mut cache = MatchCache::default();
        cache.insert("k".into(), 1, Vec::new());
        assert!(cache.get("k", 2).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_bounded_size() {
        let mut cache = MatchCache::new(100, DEFAULT_TTL);
        for i in 0..150 {
            cache.insert(format!("key-{}", i), 1, Vec::new());
            assert!(cache.len() <= 100);
        }
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn test_lru_keeps_recently_used() {
        let mut cache = MatchCache::new(2, DEFAULT_TTL);
        cache.insert("a".into(), 1, Vec::new());
        cache.insert("b".into(), 1, Vec::new());
        assert!(cache.get("a", 1).is_some());
        cache.insert("c".into(), 1, Vec::new());

        assert!(cache.get("a", 1).is_some());
        assert!(cache.get("b", 1).is_none());
        assert!(cache.get("c", 1).is_some());
    }
}
