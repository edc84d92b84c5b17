//! Distributed Lock Module
//!
//! Mutual exclusion on top of an external store that offers atomic
//! set-if-absent, compare-and-delete and compare-and-extend operations.
//!
//! # Components
//! - [`LockStore`]: the store capability, with [`MemoryLockStore`] and,
//!   behind the `redis` feature, `RedisLockStore`
//! - [`LockClient`]: single, retrying and single-flight acquisition
//! - [`Lock`]: unlock, refresh and auto-refresh of a held lock

mod client;
mod flight;
mod handle;
#[cfg(feature = "redis")]
mod redis_store;
mod store;

pub use client::LockClient;
pub use handle::Lock;
#[cfg(feature = "redis")]
pub use redis_store::RedisLockStore;
pub use store::{LockStore, MemoryLockStore};
