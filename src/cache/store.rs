//! Expiring Map Module
//!
//! Concurrent key/value map with per-entry deadlines, passive expiration on
//! read and a bounded background sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{oneshot, RwLock, RwLockWriteGuard};
use tokio::time::Instant;

use crate::cache::ring::KeyRing;
use crate::cache::stats::StatsRecorder;
use crate::cache::{Cache, CacheEntry, CacheStats};
use crate::error::{CacheError, Result};
use crate::tasks::spawn_sweep_task;

/// Default interval between background sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of entries inspected per sweep tick
pub const DEFAULT_MAX_SCAN_PER_TICK: usize = 1000;

/// Callback invoked with every removed entry.
///
/// Runs while the map's exclusive section is held: it must not block and
/// must not call back into the same map.
pub type EvictionCallback<V> = Arc<dyn Fn(&str, &V) + Send + Sync>;

// == Map State ==
/// Everything guarded by the map's exclusive section.
pub(crate) struct MapState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    ring: KeyRing,
    on_evict: Option<EvictionCallback<V>>,
    stats: StatsRecorder,
}

impl<V> MapState<V> {
    fn new(on_evict: Option<EvictionCallback<V>>) -> Self {
        Self {
            entries: HashMap::with_capacity(128),
            ring: KeyRing::new(),
            on_evict,
            stats: StatsRecorder::default(),
        }
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // == Insert ==
    /// Stores or replaces an entry. Replacement is not an eviction.
    pub(crate) fn insert(&mut self, key: &str, value: V, ttl: Duration) {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        self.ring.insert(key);
    }

    // == Remove ==
    /// Removes an entry and reports it to the eviction callback.
    pub(crate) fn remove(&mut self, key: &str) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.ring.remove(key);
        self.stats.record_eviction();
        if let Some(on_evict) = &self.on_evict {
            on_evict(key, &entry.value);
        }
        Some(entry.value)
    }

    // == Expire Checked ==
    /// Settles a read that found `key` expired at `now` under the shared
    /// section.
    ///
    /// The entry is looked up again: one replaced by a `set` in between is
    /// returned, one still expired is removed.
    pub(crate) fn expire_checked(&mut self, key: &str, now: Instant) -> Result<V>
    where
        V: Clone,
    {
        match self.entries.get(key) {
            None => {
                self.stats.record_miss();
                return Err(CacheError::NotFound(key.to_string()));
            }
            Some(entry) if !entry.is_expired_at(now) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                return Ok(value);
            }
            Some(_) => {}
        }
        self.remove(key);
        self.stats.record_miss();
        Err(CacheError::NotFound(key.to_string()))
    }

    // == Sweep ==
    /// Inspects at most `max_scan` entries and removes the expired ones.
    ///
    /// Returns the number of entries removed.
    fn sweep(&mut self, max_scan: usize, now: Instant) -> usize {
        let batch = self.ring.next_batch(max_scan);
        let mut removed = 0;
        for key in batch {
            let expired = self
                .entries
                .get(&key)
                .is_some_and(|entry| entry.is_expired_at(now));
            if expired && self.remove(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }
}

// == Shared Inner ==
/// State shared between the map handle and its sweep task.
pub(crate) struct Inner<V> {
    state: RwLock<MapState<V>>,
    max_scan_per_tick: usize,
}

impl<V> Inner<V> {
    /// Runs one sweep tick under the exclusive section.
    pub(crate) async fn sweep_expired(&self) -> usize {
        let mut state = self.state.write().await;
        state.sweep(self.max_scan_per_tick, Instant::now())
    }
}

// == Builder ==
/// Configures and starts an [`ExpiringMap`].
pub struct ExpiringMapBuilder<V> {
    sweep_interval: Duration,
    max_scan_per_tick: usize,
    on_evict: Option<EvictionCallback<V>>,
}

impl<V> Default for ExpiringMapBuilder<V> {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_scan_per_tick: DEFAULT_MAX_SCAN_PER_TICK,
            on_evict: None,
        }
    }
}

impl<V> ExpiringMapBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Interval between sweep ticks. `Duration::ZERO` disables the sweep.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Upper bound on entries inspected per sweep tick.
    pub fn max_scan_per_tick(mut self, max_scan: usize) -> Self {
        self.max_scan_per_tick = max_scan;
        self
    }

    /// Registers the eviction callback, replacing any previous one.
    pub fn on_evict<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &V) + Send + Sync + 'static,
    {
        self.on_evict = Some(Arc::new(callback));
        self
    }

    pub(crate) fn take_on_evict(&mut self) -> Option<EvictionCallback<V>> {
        self.on_evict.take()
    }

    // == Build ==
    /// Creates the map and starts its sweep task.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime, like `tokio::spawn`.
    pub fn build(self) -> ExpiringMap<V> {
        let inner = Arc::new(Inner {
            state: RwLock::new(MapState::new(self.on_evict)),
            max_scan_per_tick: self.max_scan_per_tick,
        });
        let (closer, stop) = oneshot::channel();

        if !self.sweep_interval.is_zero() {
            spawn_sweep_task(Arc::downgrade(&inner), self.sweep_interval, stop);
        }

        ExpiringMap {
            inner,
            closer: Mutex::new(Some(closer)),
        }
    }
}

// == Expiring Map ==
/// TTL-aware concurrent map.
///
/// Expired entries are removed lazily by [`get`](ExpiringMap::get) and
/// actively by a background task that inspects a bounded number of entries
/// per tick. Every removal, whatever its cause, invokes the eviction
/// callback exactly once.
pub struct ExpiringMap<V> {
    inner: Arc<Inner<V>>,
    closer: Mutex<Option<oneshot::Sender<()>>>,
}

impl<V> ExpiringMap<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a map with the given sweep interval and default settings.
    pub fn new(sweep_interval: Duration) -> Self {
        Self::builder().sweep_interval(sweep_interval).build()
    }

    pub fn builder() -> ExpiringMapBuilder<V> {
        ExpiringMapBuilder::default()
    }

    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// An expired entry found under the shared section is re-checked under
    /// the exclusive section before removal, since a concurrent `set` may
    /// have extended it in between.
    pub async fn get(&self, key: &str) -> Result<V> {
        let now = Instant::now();
        {
            let state = self.inner.state.read().await;
            match state.entries.get(key) {
                None => {
                    state.stats.record_miss();
                    return Err(CacheError::NotFound(key.to_string()));
                }
                Some(entry) if !entry.is_expired_at(now) => {
                    let value = entry.value.clone();
                    state.stats.record_hit();
                    return Ok(value);
                }
                Some(_) => {}
            }
        }

        let mut state = self.inner.state.write().await;
        state.expire_checked(key, now)
    }

    // == Set ==
    /// Stores a value, overwriting any previous entry without eviction.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Time to live; `Duration::ZERO` means never expire
    pub async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        let mut state = self.inner.state.write().await;
        state.insert(key, value, ttl);
        Ok(())
    }

    // == Delete ==
    /// Removes an entry if present. Deleting an absent key is a no-op.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.inner.state.write().await;
        state.remove(key);
        Ok(())
    }

    // == Load And Delete ==
    /// Removes an entry and returns its value in one exclusive section.
    ///
    /// The value is returned even if its deadline has already passed.
    pub async fn load_and_delete(&self, key: &str) -> Result<V> {
        let mut state = self.inner.state.write().await;
        state
            .remove(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    // == Close ==
    /// Stops the background sweep.
    ///
    /// Does not wait for in-flight operations. A second call returns
    /// [`CacheError::AlreadyClosed`].
    pub fn close(&self) -> Result<()> {
        let closer = self.closer.lock().take().ok_or(CacheError::AlreadyClosed)?;
        // The task may already be gone if the sweep is disabled
        let _ = closer.send(());
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closer.lock().is_none()
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet removed.
    pub async fn len(&self) -> usize {
        self.inner.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        let state = self.inner.state.read().await;
        state.stats.snapshot(state.entries.len())
    }

    /// Acquires the exclusive section for composite operations.
    pub(crate) async fn write_state(&self) -> RwLockWriteGuard<'_, MapState<V>> {
        self.inner.state.write().await
    }

    #[cfg(test)]
    pub(crate) fn shared_inner(&self) -> Arc<Inner<V>> {
        Arc::clone(&self.inner)
    }
}

#[async_trait]
impl<V> Cache<V> for ExpiringMap<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<V> {
        ExpiringMap::get(self, key).await
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        ExpiringMap::set(self, key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        ExpiringMap::delete(self, key).await
    }
}
