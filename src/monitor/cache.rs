//! Response Cache
//!
//! Reuses a provider's successful answer for the same query text within one
//! time bucket. Keys are `(query text, provider, bucket)`; concurrent writers
//! to the same key resolve last-write-wins.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::types::{ProviderKind, ProviderResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    query: String,
    provider: ProviderKind,
    bucket: i64,
}

/// Concurrent map of raw (unanalyzed) successful provider results
pub struct ResponseCache {
    entries: DashMap<CacheKey, ProviderResult>,
    bucket_secs: i64,
}

impl ResponseCache {
    /// Bucket widths under one second are rounded up to one second.
    pub fn new(bucket: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            bucket_secs: bucket.as_secs().max(1) as i64,
        }
    }

    fn key(&self, query: &str, provider: ProviderKind, now: DateTime<Utc>) -> CacheKey {
        CacheKey {
            query: query.to_string(),
            provider,
            bucket: now.timestamp().div_euclid(self.bucket_secs),
        }
    }

    pub fn get(&self, query: &str, provider: ProviderKind) -> Option<ProviderResult> {
        self.get_at(query, provider, Utc::now())
    }

    pub fn get_at(
        &self,
        query: &str,
        provider: ProviderKind,
        now: DateTime<Utc>,
    ) -> Option<ProviderResult> {
        let hit = self
            .entries
            .get(&self.key(query, provider, now))
            .map(|entry| entry.value().clone());
        if hit.is_some() {
            debug!(provider = %provider, "Response cache hit");
        }
        hit
    }

    /// Store a successful result. Failures are never cached.
    pub fn insert(&self, query: &str, result: &ProviderResult) {
        self.insert_at(query, result, Utc::now());
    }

    pub fn insert_at(&self, query: &str, result: &ProviderResult, now: DateTime<Utc>) {
        if !result.is_success() {
            return;
        }
        self.entries
            .insert(self.key(query, result.provider, now), result.clone());
    }

    /// Drop entries from buckets before the one containing `now`
    pub fn purge_stale(&self, now: DateTime<Utc>) -> usize {
        let current = now.timestamp().div_euclid(self.bucket_secs);
        let before = self.entries.len();
        self.entries.retain(|key, _| key.bucket >= current);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::TokenUsage;
    use crate::types::{ProviderError, ProviderErrorKind};
    use chrono::TimeZone;

    fn ok(provider: ProviderKind, text: &str) -> ProviderResult {
        ProviderResult::succeeded(provider, "m", 10, text, TokenUsage::default())
    }

    #[test]
    fn test_hit_within_bucket_miss_after() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 5).unwrap();
        cache.insert_at("best bi firms", &ok(ProviderKind::Openai, "a"), t0);

        let same_bucket = t0 + chrono::Duration::seconds(30);
        let next_bucket = t0 + chrono::Duration::seconds(60);
        assert!(cache.get_at("best bi firms", ProviderKind::Openai, same_bucket).is_some());
        assert!(cache.get_at("best bi firms", ProviderKind::Openai, next_bucket).is_none());
        assert!(cache.get_at("best bi firms", ProviderKind::Gemini, same_bucket).is_none());
        assert!(cache.get_at("other query", ProviderKind::Openai, same_bucket).is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let now = Utc::now();
        cache.insert_at("q", &ok(ProviderKind::Perplexity, "first"), now);
        cache.insert_at("q", &ok(ProviderKind::Perplexity, "second"), now);

        let hit = cache.get_at("q", ProviderKind::Perplexity, now).unwrap();
        assert_eq!(hit.text(), Some("second"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_not_cached() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let failed = ProviderResult::failed(
            ProviderKind::Gemini,
            "gemini-pro",
            5,
            ProviderError::new(ProviderErrorKind::RateLimit, "slow down"),
        );
        cache.insert("q", &failed);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_stale() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        cache.insert_at("old", &ok(ProviderKind::Openai, "x"), t0);
        cache.insert_at("new", &ok(ProviderKind::Openai, "y"), t0 + chrono::Duration::seconds(20));

        assert_eq!(cache.purge_stale(t0 + chrono::Duration::seconds(25)), 1);
        assert_eq!(cache.len(), 1);
    }
}
