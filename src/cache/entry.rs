//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with an optional deadline.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single cache entry with its value and expiration deadline.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Absolute expiration time, None = never expires
    pub deadline: Option<Instant>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - Time to live; `Duration::ZERO` means the entry never expires
    pub fn new(value: V, ttl: Duration) -> Self {
        let deadline = if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        };

        Self { value, deadline }
    }

    // == Is Expired ==
    /// Checks if the entry had expired at `now`.
    ///
    /// An entry is expired only once `now` is strictly past its deadline, so a
    /// read at exactly the deadline still sees the value.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) => deadline < now,
            None => false,
        }
    }

    /// Checks if the entry has expired as of the current instant.
    #[cfg(test)]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Time To Live ==
    /// Returns the remaining time to live, or None if no deadline is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the deadline has passed
    /// - `Some(remaining)` if the entry has a deadline in the future
    /// - `None` if the entry never expires
    #[cfg(test)]
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
