//! Error types for the cache and lock engines
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Errors returned by the local expiring map and its capacity guard.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key absent, or expired at read time
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The capacity guard refused to admit a new key
    #[error("Cache over capacity: at most {max} entries")]
    CapacityExceeded { max: usize },

    /// The background sweep was already stopped
    #[error("Cache already closed")]
    AlreadyClosed,
}

// == Store Error Enum ==
/// Opaque failure reported by an external lock store.
///
/// Backends map their own timeouts to [`StoreError::Timeout`]; that is the
/// only flavor the acquisition loop treats as retryable.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The store did not answer in time
    #[error("Store operation timed out")]
    Timeout,

    /// Any other backend failure, propagated unchanged
    #[error("Store failure: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a backend error.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Arc::new(err))
    }
}

// == Lock Error Enum ==
/// Errors returned by the distributed lock client and lock handles.
///
/// `Clone` so a single-flight leader can hand the same outcome to every
/// waiter.
#[derive(Error, Debug, Clone)]
pub enum LockError {
    /// A single acquisition attempt found the key already held
    #[error("Lock busy: {0}")]
    Busy(String),

    /// The retry strategy ran out before the lock was obtained
    #[error("Failed to acquire lock {key} after {attempts} attempts")]
    Failed { key: String, attempts: u32 },

    /// The store no longer maps the key to this owner-id
    #[error("Lock not held: {0}")]
    NotHeld(String),

    /// The task carrying the operation was cancelled
    #[error("Lock operation canceled")]
    Canceled,

    /// A caller deadline or a per-call timeout fired
    #[error("Lock operation deadline exceeded")]
    DeadlineExceeded,

    /// A periodic operation was given a zero interval
    #[error("Refresh interval must be non-zero")]
    ZeroInterval,

    /// Failure reported by the external store
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LockError {
    // == Is Timeout ==
    /// Returns true for the timeout flavors that retry loops may retry.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            LockError::DeadlineExceeded | LockError::Store(StoreError::Timeout)
        )
    }
}

// == Result Type Aliases ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Convenience Result type for lock operations.
pub type LockResult<T> = std::result::Result<T, LockError>;
