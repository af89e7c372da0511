//! Cache Coordinator
//!
//! Keyed cache of fetched values with at most one in-flight load per key and
//! coarse invalidation by resource tag. Backed by Moka's async cache, whose
//! `try_get_with` makes concurrent callers for the same key await a single
//! loader invocation.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::query::ResourceTag;

/// A fetched value with the tag it is invalidated by
#[derive(Debug)]
struct CacheEntry<V> {
    value: Arc<V>,
    tag: ResourceTag,
    fetched_at: Instant,
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            tag: self.tag,
            fetched_at: self.fetched_at,
        }
    }
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Loader invocations, foreground and prefetch
    pub loads: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            (self.hits as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Generic key → value cache with request de-duplication
///
/// Entries are never updated in place: invalidation evicts them and the next
/// request loads a fresh value. Loader failures are not cached.
pub struct CacheCoordinator<K, V> {
    name: &'static str,
    entries: Cache<K, CacheEntry<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: Arc<AtomicU64>,
}

impl<K, V> CacheCoordinator<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Create a coordinator whose entries expire `ttl` after being fetched
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        let entries = Cache::builder()
            .name(name)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();

        Self {
            name,
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return the cached value for `key`, or load it
    ///
    /// Concurrent calls for a key that is not cached share one `loader`
    /// invocation. A loader error reaches every caller waiting on that load
    /// and nothing is stored.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: K,
        tag: ResourceTag,
        loader: F,
    ) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Clone + Send + Sync + 'static,
    {
        if let Some(entry) = self.entries.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(
                cache = self.name,
                key = ?key,
                age_ms = entry.fetched_at.elapsed().as_millis() as u64,
                "Cache HIT"
            );
            return Ok(entry.value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(cache = self.name, key = ?key, "Cache MISS");

        self.load(key, tag, loader).await
    }

    /// Warm the cache for `key` in the background
    ///
    /// Never reports to a caller: failures are logged and dropped, so the key
    /// simply loads again when it is requested in the foreground.
    pub fn prefetch<F, Fut, E>(
        self: &Arc<Self>,
        key: K,
        tag: ResourceTag,
        loader: F,
    ) -> impl Future<Output = ()> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Clone + std::fmt::Display + Send + Sync + 'static,
    {
        let this = Arc::clone(self);
        async move {
            if this.entries.contains_key(&key) {
                trace!(cache = this.name, key = ?key, "Prefetch skipped, already cached");
                return;
            }
            if let Err(e) = this.load(key.clone(), tag, loader).await {
                warn!(cache = this.name, key = ?key, error = %e, "Prefetch failed");
            }
        }
    }

    /// Spawn `prefetch` on the runtime and forget about it
    pub fn spawn_prefetch<F, Fut, E>(
        self: &Arc<Self>,
        key: K,
        tag: ResourceTag,
        loader: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Clone + std::fmt::Display + Send + Sync + 'static,
    {
        tokio::spawn(self.prefetch(key, tag, loader))
    }

    /// Whether `key` is cached right now
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Evict every entry tagged `tag`
    ///
    /// Loads already in flight are not cancelled; whatever they store lands
    /// after the eviction.
    pub fn invalidate(&self, tag: ResourceTag) {
        let result = self
            .entries
            .invalidate_entries_if(move |_key, entry| entry.tag == tag);
        match result {
            Ok(_) => debug!(cache = self.name, tag = %tag, "Invalidated entries by tag"),
            Err(e) => {
                // Evicting too much is safe, keeping stale entries is not
                error!(cache = self.name, tag = %tag, error = %e, "Tag invalidation unavailable, clearing cache");
                self.entries.invalidate_all();
            }
        }
    }

    /// Clear the whole cache and reset counters
    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.loads.store(0, Ordering::Relaxed);
        debug!(cache = self.name, "Cleared cache");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
        }
    }

    /// Log current cache metrics
    pub fn log_metrics(&self) {
        let stats = self.stats();
        debug!(
            cache = self.name,
            hits = stats.hits,
            misses = stats.misses,
            loads = stats.loads,
            hit_rate = format!("{:.1}%", stats.hit_rate()),
            entries = self.entries.entry_count(),
            "Cache metrics"
        );
    }

    async fn load<F, Fut, E>(&self, key: K, tag: ResourceTag, loader: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Clone + Send + Sync + 'static,
    {
        let loads = Arc::clone(&self.loads);
        let init = async move {
            loads.fetch_add(1, Ordering::Relaxed);
            loader().await.map(|value| CacheEntry {
                value: Arc::new(value),
                tag,
                fetched_at: Instant::now(),
            })
        };

        match self.entries.try_get_with(key, init).await {
            Ok(entry) => Ok(entry.value),
            Err(shared) => Err(Arc::try_unwrap(shared).unwrap_or_else(|e| (*e).clone())),
        }
    }
}
