//! Cache Module
//!
//! Provides in-process caching with TTL expiration, a bounded background
//! sweep and an optional hard entry limit.

mod capacity;
mod entry;
mod ring;
mod stats;
pub(crate) mod store;

#[cfg(test)]
mod property_tests;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

// Re-export public types
pub use capacity::CapacityGuard;
pub(crate) use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::{
    EvictionCallback, ExpiringMap, ExpiringMapBuilder, DEFAULT_MAX_SCAN_PER_TICK,
    DEFAULT_SWEEP_INTERVAL,
};

// == Cache Capability ==
/// The minimal get/set/delete contract shared by the local caches.
#[async_trait]
pub trait Cache<V>: Send + Sync {
    /// Returns the live value for `key`, or `CacheError::NotFound`.
    async fn get(&self, key: &str) -> Result<V>;

    /// Stores `value` under `key`; `Duration::ZERO` means never expire.
    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()>;

    /// Removes `key` if present.
    async fn delete(&self, key: &str) -> Result<()>;
}
