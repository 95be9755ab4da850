//! Typed handle over a Moka cache.

use std::hash::Hash;
use std::sync::Arc;

use moka::ops::compute::{CompResult, Op};
use moka::sync::Cache;

use super::CacheConfig;

/// Named, bounded Moka cache. Clones share the same entries.
pub struct TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Cache<K, V>>,
    name: Arc<str>,
}

impl<K, V> Clone for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            name: Arc::clone(&self.name),
        }
    }
}

impl<K, V> TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<Arc<str>>, config: CacheConfig) -> Self {
        let name = name.into();
        let mut builder = Cache::builder()
            .name(&name)
            .max_capacity(config.max_capacity);
        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }
        if let Some(tti) = config.tti {
            builder = builder.time_to_idle(tti);
        }

        Self {
            inner: Arc::new(builder.build()),
            name,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    pub fn invalidate(&self, key: &K) {
        self.inner.invalidate(key);
    }

    /// The cached value, or the result of `load` stored under `key`.
    ///
    /// Concurrent callers for one key share a single `load`. A failure reaches
    /// every waiter and leaves the key vacant.
    pub fn get_or_try_insert_with<F, E>(&self, key: K, load: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Result<V, E>,
        E: Send + Sync + 'static,
    {
        self.inner.try_get_with(key, load)
    }

    /// Atomically replace a present value with `f(value)`.
    ///
    /// Vacant keys stay vacant. Returns whether a value was replaced.
    pub fn update_if_present<F>(&self, key: K, f: F) -> bool
    where
        F: FnOnce(V) -> V,
    {
        let result = self.inner.entry(key).and_compute_with(|entry| match entry {
            Some(entry) => Op::Put(f(entry.into_value())),
            None => Op::Nop,
        });
        matches!(result, CompResult::ReplacedWith(_))
    }
}

impl<K, V> std::fmt::Debug for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedCache")
            .field("name", &self.name)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}
