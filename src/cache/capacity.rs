//! Capacity Guard Module
//!
//! Wraps an [`ExpiringMap`] with a hard ceiling on the number of entries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{Cache, CacheStats, ExpiringMap, ExpiringMapBuilder};
use crate::error::{CacheError, Result};

// == Capacity Guard ==
/// An expiring map that refuses new keys once `max_entries` are stored.
///
/// The admission check and the insert happen in the map's exclusive section.
/// The entry count is decremented only by the eviction callback, so every
/// removal path (sweep, passive expiration, delete) keeps it accurate.
pub struct CapacityGuard<V> {
    map: ExpiringMap<V>,
    count: Arc<AtomicUsize>,
    max_entries: usize,
}

impl<V> CapacityGuard<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Builds the inner map with a counting eviction callback composed
    /// around the one already registered on `builder`.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn new(mut builder: ExpiringMapBuilder<V>, max_entries: usize) -> Self {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let origin = builder.take_on_evict();

        let map = builder
            .on_evict(move |key: &str, value: &V| {
                counter.fetch_sub(1, Ordering::SeqCst);
                if let Some(origin) = &origin {
                    origin(key, value);
                }
            })
            .build();

        Self {
            map,
            count,
            max_entries,
        }
    }

    // == Set ==
    /// Stores a value if the key exists already or there is room for it.
    ///
    /// A rejected set leaves the map untouched.
    pub async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        let mut state = self.map.write_state().await;
        if !state.contains_key(key) {
            if self.count.load(Ordering::SeqCst) + 1 > self.max_entries {
                return Err(CacheError::CapacityExceeded {
                    max: self.max_entries,
                });
            }
            self.count.fetch_add(1, Ordering::SeqCst);
        }
        state.insert(key, value, ttl);
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<V> {
        self.map.get(key).await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.map.delete(key).await
    }

    pub async fn load_and_delete(&self, key: &str) -> Result<V> {
        self.map.load_and_delete(key).await
    }

    /// Stops the inner map's sweep.
    pub fn close(&self) -> Result<()> {
        self.map.close()
    }

    // == Length ==
    /// Number of keys admitted through the guard and not yet removed.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub async fn stats(&self) -> CacheStats {
        self.map.stats().await
    }
}

#[async_trait]
impl<V> Cache<V> for CapacityGuard<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<V> {
        CapacityGuard::get(self, key).await
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        CapacityGuard::set(self, key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        CapacityGuard::delete(self, key).await
    }
}
