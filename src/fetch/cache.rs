//! Two-tier content cache: in-process LRU fronting an optional shared
//! key/value backend.
//!
//! Keys are `"fetch:{mode}:{normalized URL}"`. The shared backend is a
//! remote collaborator and best-effort only: every backend failure is logged
//! at warn and the in-process tier carries on. Entries expire by insertion
//! time regardless of LRU position.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
// Sync mutex on purpose: the LRU critical sections are short and never
// cross an await point.
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ServiceConfig;

/// Fetch mode, part of the cache identity: a rendered page and its raw HTTP
/// counterpart are different resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    Http,
    Rendered,
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Rendered => write!(f, "rendered"),
        }
    }
}

/// A cached fetch result plus the validators needed for revalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub body: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub final_url: String,
    pub protocol: String,
    pub fetched_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl CacheEntry {
    /// Whether this entry is past the TTL measured from insertion.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.fetched_at);
        age.num_milliseconds() >= ttl.as_millis() as i64
    }

    /// Whether the entry carries validators usable for a conditional
    /// re-request.
    #[must_use]
    pub fn has_validators(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }

    /// Refresh the insertion timestamp after a 304 revalidation.
    pub fn touch(&mut self) {
        self.fetched_at = Utc::now();
    }
}

/// Shared key/value store collaborator (e.g. a remote cache service).
///
/// Implementations must not panic on disconnect; errors are degraded to the
/// in-process tier by the cache.
#[async_trait]
pub trait SharedCacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// Key for a fetch cache entry.
#[must_use]
pub fn fetch_key(mode: FetchMode, normalized_url: &str) -> String {
    format!("fetch:{mode}:{normalized_url}")
}

/// Key for a tenant's monthly quota counter in the shared store.
#[must_use]
pub fn quota_key(tenant: &str, now: DateTime<Utc>) -> String {
    format!("quota:{tenant}:{}", now.format("%Y-%m"))
}

/// TTL that expires a monthly quota key at a month boundary (31 days is a
/// safe upper bound; the key name itself changes each month).
#[must_use]
pub fn quota_ttl() -> Duration {
    Duration::from_secs(31 * 24 * 3600)
}

/// Two-tier content cache.
pub struct ContentCache {
    lru: Mutex<LruCache<String, CacheEntry>>,
    shared: Option<Arc<dyn SharedCacheBackend>>,
    ttl: Duration,
}

impl ContentCache {
    #[must_use]
    pub fn new(config: &ServiceConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_max_entries().max(1))
            .unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            lru: Mutex::new(LruCache::new(capacity)),
            shared: None,
            ttl: config.cache_ttl(),
        }
    }

    /// Attach a shared backend tier.
    #[must_use]
    pub fn with_shared_backend(mut self, backend: Arc<dyn SharedCacheBackend>) -> Self {
        self.shared = Some(backend);
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up an entry. Read path: LRU first, then the shared backend; a
    /// shared hit refreshes the LRU. Expired entries are dropped from the
    /// LRU and reported as stale so the caller can revalidate.
    pub async fn get(&self, mode: FetchMode, normalized_url: &str) -> CacheLookup {
        let key = fetch_key(mode, normalized_url);

        {
            let mut lru = self.lru.lock();
            if let Some(entry) = lru.get(&key) {
                if entry.is_expired(self.ttl) {
                    let stale = entry.clone();
                    lru.pop(&key);
                    return CacheLookup::Stale(stale);
                }
                return CacheLookup::Fresh(entry.clone());
            }
        }

        if let Some(shared) = &self.shared {
            match shared.get(&key).await {
                Ok(Some(json)) => match serde_json::from_str::<CacheEntry>(&json) {
                    Ok(entry) => {
                        if entry.is_expired(self.ttl) {
                            return CacheLookup::Stale(entry);
                        }
                        self.lru.lock().put(key, entry.clone());
                        return CacheLookup::Fresh(entry);
                    }
                    Err(e) => {
                        warn!(key, error = %e, "shared cache entry failed to deserialize");
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    warn!(key, error = %e, "shared cache backend unavailable on read");
                }
            }
        }

        CacheLookup::Miss
    }

    /// Store an entry in both tiers. Shared-backend failure is non-fatal.
    pub async fn put(&self, mode: FetchMode, normalized_url: &str, entry: CacheEntry) {
        let key = fetch_key(mode, normalized_url);
        self.lru.lock().put(key.clone(), entry.clone());

        if let Some(shared) = &self.shared {
            match serde_json::to_string(&entry) {
                Ok(json) => {
                    if let Err(e) = shared.set(&key, json, Some(self.ttl)).await {
                        warn!(key, error = %e, "shared cache backend unavailable on write");
                    }
                }
                Err(e) => warn!(key, error = %e, "cache entry failed to serialize"),
            }
        }
        debug!(key, "cache entry stored");
    }

    /// Refresh a revalidated entry's timestamp in both tiers.
    pub async fn refresh(&self, mode: FetchMode, normalized_url: &str, mut entry: CacheEntry) {
        entry.touch();
        self.put(mode, normalized_url, entry).await;
    }

    /// Drop an entry from both tiers.
    pub async fn invalidate(&self, mode: FetchMode, normalized_url: &str) {
        let key = fetch_key(mode, normalized_url);
        self.lru.lock().pop(&key);
        if let Some(shared) = &self.shared
            && let Err(e) = shared.delete(&key).await
        {
            warn!(key, error = %e, "shared cache backend unavailable on delete");
        }
    }
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// Entry within TTL; serve it directly.
    Fresh(CacheEntry),
    /// Entry past TTL; the caller should revalidate with its validators.
    Stale(CacheEntry),
    Miss,
}
