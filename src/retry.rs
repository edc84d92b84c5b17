//! Retry Strategies
//!
//! Pluggable backoff policies used by the lock acquisition loop.

use std::time::Duration;

// == Retry Strategy ==
/// A stateful backoff policy.
///
/// Each call to [`next`](RetryStrategy::next) either grants one more attempt,
/// returning the interval to wait before it, or reports exhaustion with
/// `None`. Once `None` has been returned every later call returns `None`.
pub trait RetryStrategy: Send {
    /// Returns the wait before the next attempt, or `None` when exhausted.
    fn next(&mut self) -> Option<Duration>;
}

impl<R: RetryStrategy + ?Sized> RetryStrategy for Box<R> {
    fn next(&mut self) -> Option<Duration> {
        (**self).next()
    }
}

impl<R: RetryStrategy + ?Sized> RetryStrategy for &mut R {
    fn next(&mut self) -> Option<Duration> {
        (**self).next()
    }
}

// == Fixed Interval ==
/// Constant interval, bounded number of retries.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    interval: Duration,
    max_retries: u32,
    retries: u32,
}

impl FixedInterval {
    /// Creates a policy granting `max_retries` retries spaced by `interval`.
    pub fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
            retries: 0,
        }
    }

    /// Number of retries granted so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

impl RetryStrategy for FixedInterval {
    fn next(&mut self) -> Option<Duration> {
        if self.retries >= self.max_retries {
            return None;
        }
        self.retries += 1;
        Some(self.interval)
    }
}

// == Exponential Backoff ==
/// Doubling interval capped at `max_interval`, bounded number of retries.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    next_interval: Duration,
    max_interval: Duration,
    max_retries: u32,
    retries: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max_interval: Duration, max_retries: u32) -> Self {
        Self {
            next_interval: initial.min(max_interval),
            max_interval,
            max_retries,
            retries: 0,
        }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next(&mut self) -> Option<Duration> {
        if self.retries >= self.max_retries {
            return None;
        }
        self.retries += 1;
        let current = self.next_interval;
        self.next_interval = current.saturating_mul(2).min(self.max_interval);
        Some(current)
    }
}
