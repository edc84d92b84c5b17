//! Lease Cache - TTL caching and distributed leases
//!
//! Provides an in-process expiring map with bounded background expiration
//! and an optional entry limit, and a distributed lock with retrying,
//! single-flight acquisition and cooperative lease renewal.

pub mod cache;
pub mod config;
pub mod error;
pub mod lock;
pub mod retry;
mod tasks;

pub use cache::{Cache, CapacityGuard, ExpiringMap};
pub use config::Config;
pub use error::{CacheError, LockError, StoreError};
pub use lock::{Lock, LockClient, LockStore, MemoryLockStore};
pub use retry::{ExponentialBackoff, FixedInterval, RetryStrategy};
