//! Key/value cache with per-entry TTL.
//!
//! Backs report payload entries (`report:<id>`) and login sessions
//! (`session:<id>`). Values are opaque strings; writes overwrite, reads never
//! refresh the expiry.

use async_trait::async_trait;
use desk_core::{expiry_after, is_expired_unix_ms, SharedClock, SystemClock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors returned by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache key cannot be empty")]
    EmptyKey,
    #[error("cache ttl must be greater than zero for key '{0}'")]
    ZeroTtl(String),
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Async cache contract used by the report store and session layer.
#[async_trait]
pub trait TtlCache: Send + Sync {
    /// Writes `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;
    /// Returns the live value for `key`, or `None` when missing or expired.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;
    /// Removes `key`; returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;
    async fn ping(&self) -> CacheResult<()>;
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
struct CacheSlot {
    value: String,
    expires_unix_ms: u64,
}

/// In-process cache backend.
pub struct InMemoryTtlCache {
    entries: RwLock<HashMap<String, CacheSlot>>,
    clock: SharedClock,
}

impl Default for InMemoryTtlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTtlCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn prune_expired(&self) -> usize {
        let now = self.clock.now_unix_ms();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, slot| !is_expired_unix_ms(Some(slot.expires_unix_ms), now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl TtlCache for InMemoryTtlCache {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }
        let Some(expires_unix_ms) = expiry_after(self.clock.now_unix_ms(), ttl) else {
            return Err(CacheError::ZeroTtl(key.to_string()));
        };
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheSlot {
                value,
                expires_unix_ms,
            },
        );
        tracing::debug!(key, expires_unix_ms, "cache entry written");
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = self.clock.now_unix_ms();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(slot) if !is_expired_unix_ms(Some(slot.expires_unix_ms), now) => {
                    return Ok(Some(slot.value.clone()));
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|slot| is_expired_unix_ms(Some(slot.expires_unix_ms), now))
        {
            entries.remove(key);
            tracing::debug!(key, "cache entry expired");
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let now = self.clock.now_unix_ms();
        let mut entries = self.entries.write().await;
        Ok(entries
            .remove(key)
            .is_some_and(|slot| !is_expired_unix_ms(Some(slot.expires_unix_ms), now)))
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheError, InMemoryTtlCache, TtlCache};
    use desk_core::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    const HOUR_MS: u64 = 60 * 60 * 1_000;

    fn cache_at(start_unix_ms: u64) -> (Arc<ManualClock>, InMemoryTtlCache) {
        let clock = Arc::new(ManualClock::new(start_unix_ms));
        let cache = InMemoryTtlCache::with_clock(clock.clone());
        (clock, cache)
    }

    #[tokio::test]
    async fn functional_entry_is_live_before_ttl_and_gone_after() {
        let (clock, cache) = cache_at(1_700_000_000_000);
        cache
            .set("report:1", "payload".to_string(), Duration::from_secs(24 * 3600))
            .await
            .expect("set");

        clock.advance_ms(23 * HOUR_MS);
        assert_eq!(
            cache.get("report:1").await.expect("get"),
            Some("payload".to_string())
        );

        clock.advance_ms(2 * HOUR_MS);
        assert_eq!(cache.get("report:1").await.expect("get"), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn functional_set_overwrites_value_and_restarts_ttl() {
        let (clock, cache) = cache_at(0);
        cache
            .set("k", "first".to_string(), Duration::from_secs(10))
            .await
            .expect("set first");
        clock.advance_ms(8_000);
        cache
            .set("k", "second".to_string(), Duration::from_secs(10))
            .await
            .expect("set second");
        clock.advance_ms(8_000);
        assert_eq!(cache.get("k").await.expect("get"), Some("second".to_string()));
    }

    #[tokio::test]
    async fn unit_reads_do_not_refresh_expiry() {
        let (clock, cache) = cache_at(0);
        cache
            .set("k", "v".to_string(), Duration::from_secs(10))
            .await
            .expect("set");
        clock.advance_ms(9_000);
        assert!(cache.get("k").await.expect("get").is_some());
        clock.advance_ms(1_000);
        assert!(cache.get("k").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn unit_delete_reports_live_removal_only() {
        let (clock, cache) = cache_at(0);
        cache
            .set("live", "v".to_string(), Duration::from_secs(5))
            .await
            .expect("set live");
        cache
            .set("stale", "v".to_string(), Duration::from_secs(1))
            .await
            .expect("set stale");
        clock.advance_ms(2_000);
        assert!(cache.delete("live").await.expect("delete live"));
        assert!(!cache.delete("stale").await.expect("delete stale"));
        assert!(!cache.delete("missing").await.expect("delete missing"));
    }

    #[tokio::test]
    async fn unit_prune_expired_counts_removed_entries() {
        let (clock, cache) = cache_at(0);
        for (key, secs) in [("a", 1), ("b", 2), ("c", 30)] {
            cache
                .set(key, "v".to_string(), Duration::from_secs(secs))
                .await
                .expect("set");
        }
        clock.advance_ms(5_000);
        assert_eq!(cache.prune_expired().await, 2);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn regression_rejects_empty_key_and_zero_ttl() {
        let cache = InMemoryTtlCache::new();
        assert!(matches!(
            cache.set("", "v".to_string(), Duration::from_secs(1)).await,
            Err(CacheError::EmptyKey)
        ));
        assert!(matches!(
            cache.set("k", "v".to_string(), Duration::ZERO).await,
            Err(CacheError::ZeroTtl(key)) if key == "k"
        ));
        assert_eq!(cache.backend_name(), "in-memory");
        cache.ping().await.expect("ping");
    }
}
