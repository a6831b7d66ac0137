//! In-memory cache for storing key-value pairs.
//!
//! Uses moka's high-performance concurrent cache implementation.

use std::{borrow::Borrow, hash::Hash, sync::Arc};

use moka::{notification::RemovalCause, sync::Cache};

/// Thread-safe in-memory cache with configurable capacity.
///
/// Used for storing:
/// - Compiled flow graphs (`MemCache<TenantId, CachedFlow>`)
/// - Session states (`MemCache<SessionKey, SessionState>`)
/// - Per-tenant metrics counters
///
/// The cache is backed by moka, which provides:
/// - Thread-safe concurrent access
/// - LRU eviction when capacity is exceeded
#[derive(Clone)]
pub struct MemCache<K, V> {
    entries: Cache<K, V>,
}

impl<K, V> MemCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Allocate a new [`MemCache`].
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Cache::new(capacity as u64),
        }
    }

    /// Like [`MemCache::new`], calling `on_evict` for every entry dropped to stay within capacity.
    pub fn with_eviction_listener(
        capacity: usize,
        on_evict: impl Fn(&K) + Send + Sync + 'static,
    ) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity as u64)
            .eviction_listener(move |key: Arc<K>, _value: V, cause: RemovalCause| {
                if matches!(cause, RemovalCause::Size) {
                    on_evict(&key);
                }
            })
            .build();
        Self {
            entries,
        }
    }

    /// Insert or replace an entry.
    pub fn set(
        &self,
        key: K,
        value: V,
    ) {
        self.entries.insert(key, value);
    }

    /// Get a value through key `&Q`.
    pub fn get<Q>(
        &self,
        key: &Q,
    ) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    /// Get the value for `key`, inserting the result of `init` when absent.
    pub fn get_with(
        &self,
        key: K,
        init: impl FnOnce() -> V,
    ) -> V {
        self.entries.get_with(key, init)
    }

    /// Remove a value through key `&Q`, returning it if present.
    pub fn remove<Q>(
        &self,
        key: &Q,
    ) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Apply pending evictions now instead of on a later access.
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }

    /// Return an iterator over the entries of the cache.
    pub fn iter(&self) -> moka::sync::Iter<'_, K, V> {
        self.entries.iter()
    }
}
