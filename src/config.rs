//! Configuration Module
//!
//! Handles loading cache and lock parameters from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::ExpiringMapBuilder;
use crate::retry::FixedInterval;

/// Cache and lock configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Background sweep interval in milliseconds (0 disables the sweep)
    pub sweep_interval_ms: u64,
    /// Maximum entries inspected per sweep tick
    pub max_scan_per_tick: usize,
    /// Maximum number of entries admitted by a capacity guard
    pub max_entries: usize,
    /// Lock lease duration in milliseconds
    pub lock_lease_ms: u64,
    /// Bound on a single lock acquisition attempt in milliseconds
    pub lock_attempt_timeout_ms: u64,
    /// Wait between lock acquisition attempts in milliseconds
    pub lock_retry_interval_ms: u64,
    /// Number of retries after the first acquisition attempt
    pub lock_max_retries: u32,
    /// Auto-refresh tick in milliseconds, must be non-zero
    pub lock_refresh_interval_ms: u64,
    /// Bound on a single refresh call in milliseconds
    pub lock_refresh_timeout_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SWEEP_INTERVAL_MS` (default: 1000)
    /// - `MAX_SCAN_PER_TICK` (default: 1000)
    /// - `MAX_ENTRIES` (default: 10000)
    /// - `LOCK_LEASE_MS` (default: 30000)
    /// - `LOCK_ATTEMPT_TIMEOUT_MS` (default: 1000)
    /// - `LOCK_RETRY_INTERVAL_MS` (default: 100)
    /// - `LOCK_MAX_RETRIES` (default: 10)
    /// - `LOCK_REFRESH_INTERVAL_MS` (default: 10000)
    /// - `LOCK_REFRESH_TIMEOUT_MS` (default: 1000)
    ///
    /// Unparseable values fall back to the default, as does a zero
    /// `LOCK_REFRESH_INTERVAL_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sweep_interval_ms: env_or("SWEEP_INTERVAL_MS", defaults.sweep_interval_ms),
            max_scan_per_tick: env_or("MAX_SCAN_PER_TICK", defaults.max_scan_per_tick),
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            lock_lease_ms: env_or("LOCK_LEASE_MS", defaults.lock_lease_ms),
            lock_attempt_timeout_ms: env_or(
                "LOCK_ATTEMPT_TIMEOUT_MS",
                defaults.lock_attempt_timeout_ms,
            ),
            lock_retry_interval_ms: env_or(
                "LOCK_RETRY_INTERVAL_MS",
                defaults.lock_retry_interval_ms,
            ),
            lock_max_retries: env_or("LOCK_MAX_RETRIES", defaults.lock_max_retries),
            lock_refresh_interval_ms: nonzero_or(
                env::var("LOCK_REFRESH_INTERVAL_MS").ok(),
                defaults.lock_refresh_interval_ms,
            ),
            lock_refresh_timeout_ms: env_or(
                "LOCK_REFRESH_TIMEOUT_MS",
                defaults.lock_refresh_timeout_ms,
            ),
        }
    }

    // == Derived Values ==
    /// A map builder preloaded with the sweep settings.
    pub fn map_builder<V>(&self) -> ExpiringMapBuilder<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        ExpiringMapBuilder::default()
            .sweep_interval(Duration::from_millis(self.sweep_interval_ms))
            .max_scan_per_tick(self.max_scan_per_tick)
    }

    /// A fresh retry policy for one acquisition sequence.
    pub fn retry_strategy(&self) -> FixedInterval {
        FixedInterval::new(
            Duration::from_millis(self.lock_retry_interval_ms),
            self.lock_max_retries,
        )
    }

    pub fn lock_lease(&self) -> Duration {
        Duration::from_millis(self.lock_lease_ms)
    }

    pub fn lock_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_attempt_timeout_ms)
    }

    pub fn lock_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.lock_refresh_interval_ms)
    }

    pub fn lock_refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_refresh_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 1000,
            max_scan_per_tick: 1000,
            max_entries: 10_000,
            lock_lease_ms: 30_000,
            lock_attempt_timeout_ms: 1000,
            lock_retry_interval_ms: 100,
            lock_max_retries: 10,
            lock_refresh_interval_ms: 10_000,
            lock_refresh_timeout_ms: 1000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn nonzero_or(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|v| v.parse().ok())
        .filter(|ms| *ms > 0)
        .unwrap_or(default)
}
