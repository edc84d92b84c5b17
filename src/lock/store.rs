//! Lock Store Module
//!
//! The atomic external-store capability the lock engine is built on, plus an
//! in-process implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::StoreError;

// == Lock Store ==
/// Three server-side atomic operations, each all-or-nothing.
///
/// Mutual exclusion is only as strong as the atomicity these provide.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Sets `key` to `owner` with `ttl` only if `key` is absent.
    ///
    /// Returns true iff this call created the key.
    async fn set_if_absent(
        &self,
        key: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Deletes `key` only if it currently maps to `owner`.
    ///
    /// Returns false on mismatch or absence.
    async fn compare_and_delete(&self, key: &str, owner: &str) -> Result<bool, StoreError>;

    /// Resets the TTL of `key` to `ttl` only if it currently maps to `owner`.
    ///
    /// Returns false on mismatch or absence.
    async fn compare_and_extend(
        &self,
        key: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;
}

// == Memory Lock Store ==
/// Lock store kept in process memory.
///
/// Provides the same atomicity as a remote store for callers sharing this
/// instance. Lease expiry follows the Tokio clock.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    leases: Mutex<HashMap<String, Lease>>,
}

#[derive(Debug, Clone)]
struct Lease {
    owner: String,
    expires_at: Instant,
}

impl Lease {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current owner of `key`, if its lease is still live.
    pub fn holder(&self, key: &str) -> Option<String> {
        let leases = self.leases.lock();
        leases
            .get(key)
            .filter(|lease| lease.is_live(Instant::now()))
            .map(|lease| lease.owner.clone())
    }

    fn live_owner_matches(leases: &HashMap<String, Lease>, key: &str, owner: &str) -> bool {
        leases
            .get(key)
            .is_some_and(|lease| lease.is_live(Instant::now()) && lease.owner == owner)
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn set_if_absent(
        &self,
        key: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut leases = self.leases.lock();
        if leases.get(key).is_some_and(|lease| lease.is_live(now)) {
            return Ok(false);
        }
        leases.insert(
            key.to_string(),
            Lease {
                owner: owner.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, owner: &str) -> Result<bool, StoreError> {
        let mut leases = self.leases.lock();
        if !Self::live_owner_matches(&leases, key, owner) {
            return Ok(false);
        }
        leases.remove(key);
        Ok(true)
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut leases = self.leases.lock();
        if !Self::live_owner_matches(&leases, key, owner) {
            return Ok(false);
        }
        if let Some(lease) = leases.get_mut(key) {
            lease.expires_at = Instant::now() + ttl;
        }
        Ok(true)
    }
}
