//! TTL-bounded response cache with usage-aware eviction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ComplexityTier, ModelTier};
use crate::types::ResponseResult;

/// Longest TTL honoured; larger configured values are clamped to it.
pub const MAX_TTL_HOURS: u64 = 24 * 365 * 100;

/// Cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries older than this are never served.
    pub ttl_hours: u64,
    /// Upper bound on stored entries.
    pub max_entries: usize,
    /// Leading characters of content that feed the key.
    pub key_prefix_chars: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            max_entries: 1000,
            key_prefix_chars: 200,
        }
    }
}

struct CacheEntry {
    response: ResponseResult,
    created_at: DateTime<Utc>,
    usage_count: AtomicU64,
    model_used: ModelTier,
    complexity: ComplexityTier,
    tokens_used: u64,
}

/// A response served from cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub response: ResponseResult,
    pub model_used: ModelTier,
    pub complexity: ComplexityTier,
    /// Tokens the original completion billed.
    pub tokens_used: u64,
    /// Times served, this hit included.
    pub usage_count: u64,
}

/// What to store after a successful generation.
#[derive(Debug, Clone)]
pub struct CacheValue {
    pub response: ResponseResult,
    pub model_used: ModelTier,
    pub complexity: ComplexityTier,
    pub tokens_used: u64,
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    /// Sum of usage counts across live entries.
    pub total_usage: u64,
    pub oldest_age_secs: Option<i64>,
}

/// Response cache.
///
/// Lookups share a read lock; usage counts are atomics so a hit never
/// needs the write lock. Writes and eviction take the write lock for the
/// duration of one pass only.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl ResponseCache {
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        let ttl_hours = config.ttl_hours.min(MAX_TTL_HOURS) as i64;
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::hours(ttl_hours),
            max_entries: config.max_entries.max(1),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Response cache lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("Response cache lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.created_at >= self.ttl
    }

    /// Look up a fresh entry.
    pub fn get(&self, key: &str) -> Option<CacheHit> {
        self.get_at(key, Utc::now())
    }

    /// Look up a fresh entry as of `now`. Expired entries are dropped.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<CacheHit> {
        {
            let entries = self.read();
            let entry = entries.get(key)?;
            if !self.is_expired(entry, now) {
                let usage_count = entry.usage_count.fetch_add(1, Ordering::Relaxed) + 1;
                return Some(CacheHit {
                    response: entry.response.clone(),
                    model_used: entry.model_used,
                    complexity: entry.complexity,
                    tokens_used: entry.tokens_used,
                    usage_count,
                });
            }
        }

        let mut entries = self.write();
        if entries
            .get(key)
            .is_some_and(|entry| self.is_expired(entry, now))
        {
            entries.remove(key);
            debug!(key, "Dropped expired cache entry");
        }
        None
    }

    /// Store a response.
    pub fn put(&self, key: impl Into<String>, value: CacheValue) {
        self.put_at(key, value, Utc::now());
    }

    /// Store a response as of `now`, evicting to stay within capacity.
    ///
    /// Expired entries go first. If the cache is still full, entries are
    /// evicted by ascending `(usage_count, created_at)`.
    pub fn put_at(&self, key: impl Into<String>, value: CacheValue, now: DateTime<Utc>) {
        let key = key.into();
        let mut entries = self.write();

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let before = entries.len();
            entries.retain(|_, entry| !self.is_expired(entry, now));

            if entries.len() >= self.max_entries {
                let excess = entries.len() + 1 - self.max_entries;
                let mut candidates: Vec<(u64, DateTime<Utc>, String)> = entries
                    .iter()
                    .map(|(k, e)| (e.usage_count.load(Ordering::Relaxed), e.created_at, k.clone()))
                    .collect();
                candidates.sort();
                for (_, _, victim) in candidates.into_iter().take(excess) {
                    entries.remove(&victim);
                }
            }
            debug!(evicted = before - entries.len(), "Response cache eviction pass");
        }

        entries.insert(
            key,
            CacheEntry {
                response: value.response,
                created_at: now,
                usage_count: AtomicU64::new(0),
                model_used: value.model_used,
                complexity: value.complexity,
                tokens_used: value.tokens_used,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Utc::now())
    }

    /// Drop entries expired as of `now`.
    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        before - entries.len()
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Usage and age statistics.
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let entries = self.read();
        CacheStats {
            entries: entries.len(),
            max_entries: self.max_entries,
            total_usage: entries
                .values()
                .map(|e| e.usage_count.load(Ordering::Relaxed))
                .sum(),
            oldest_age_secs: entries
                .values()
                .map(|e| (now - e.created_at).num_seconds())
                .max(),
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(message: &str) -> CacheValue {
        CacheValue {
            response: ResponseResult {
                message: message.to_string(),
                confidence_score: 0.8,
                latency_ms: 100,
                follow_up_question: None,
                suggested_actions: vec![],
                fallback_reason: None,
            },
            model_used: ModelTier::Primary,
            complexity: ComplexityTier::Moderate,
            tokens_used: 400,
        }
    }

    fn cache(max_entries: usize) -> ResponseCache {
        ResponseCache::new(CacheConfig {
            max_entries,
            ..Default::default()
        })
    }

    #[test]
    fn test_hit_counts_usage() {
        let cache = cache(10);
        let now = Utc::now();
        cache.put_at("k", value("hello there"), now);

        let first = cache.get_at("k", now).unwrap();
        let second = cache.get_at("k", now).unwrap();
        assert_eq!(first.usage_count, 1);
        assert_eq!(second.usage_count, 2);
        assert_eq!(second.response.message, "hello there");
        assert_eq!(second.tokens_used, 400);
    }

    #[test]
    fn test_never_returns_expired_entry() {
        let cache = cache(10);
        let now = Utc::now();
        cache.put_at("k", value("old"), now - Duration::hours(24));

        assert!(cache.get_at("k", now).is_none());
        assert_eq!(cache.len(), 0);

        cache.put_at("k", value("fresh"), now - Duration::hours(23));
        assert!(cache.get_at("k", now).is_some());
    }

    #[test]
    fn test_huge_ttl_is_clamped() {
        let cache = ResponseCache::new(CacheConfig {
            ttl_hours: u64::MAX,
            ..Default::default()
        });
        let now = Utc::now();
        cache.put_at("k", value("kept for a long time"), now - Duration::days(365 * 50));
        assert!(cache.get_at("k", now).is_some());
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let cache = cache(3);
        let now = Utc::now();
        for i in 0..10 {
            cache.put_at(format!("k{i}"), value("x"), now + Duration::seconds(i));
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_evicts_least_used_then_oldest() {
        let cache = cache(3);
        let now = Utc::now();
        cache.put_at("a", value("a"), now - Duration::minutes(30));
        cache.put_at("b", value("b"), now - Duration::minutes(20));
        cache.put_at("c", value("c"), now - Duration::minutes(10));

        // "a" is oldest but used; "b" is the least-used oldest.
        cache.get_at("a", now);
        cache.put_at("d", value("d"), now);

        assert!(cache.get_at("b", now).is_none());
        assert!(cache.get_at("a", now).is_some());
        assert!(cache.get_at("c", now).is_some());
        assert!(cache.get_at("d", now).is_some());
    }

    #[test]
    fn test_expired_evicted_before_used_entries() {
        let cache = cache(2);
        let now = Utc::now();
        cache.put_at("stale", value("s"), now - Duration::hours(30));
        cache.put_at("hot", value("h"), now - Duration::minutes(5));
        cache.get_at("hot", now);

        cache.put_at("new", value("n"), now);
        assert_eq!(cache.len(), 2);
        assert!(cache.get_at("hot", now).is_some());
        assert!(cache.get_at("new", now).is_some());
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = cache(2);
        let now = Utc::now();
        cache.put_at("a", value("a"), now);
        cache.put_at("b", value("b"), now);
        cache.put_at("a", value("a2"), now);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at("a", now).unwrap().response.message, "a2");
    }

    #[test]
    fn test_cleanup_and_stats() {
        let cache = cache(10);
        let now = Utc::now();
        cache.put_at("old", value("o"), now - Duration::hours(48));
        cache.put_at("new", value("n"), now);
        cache.get_at("new", now);

        assert_eq!(cache.cleanup_expired_at(now), 1);
        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_usage, 1);
        assert!(stats.oldest_age_secs.is_some());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().oldest_age_secs, None);
    }
}
