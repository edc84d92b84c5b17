//! Lock Client Module
//!
//! Acquires named locks against a [`LockStore`]: single attempts, retrying
//! acquisition and per-process single-flight acquisition.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::debug;
use uuid::Uuid;

use crate::error::{LockError, LockResult};
use crate::lock::flight::FlightGroup;
use crate::lock::{Lock, LockStore};
use crate::retry::RetryStrategy;

// == Lock Client ==
/// Entry point for distributed locks.
///
/// Cheap to clone; clones share the store and the single-flight registry.
#[derive(Clone)]
pub struct LockClient {
    store: Arc<dyn LockStore>,
    flights: FlightGroup<LockResult<Lock>>,
}

impl LockClient {
    // == Constructor ==
    pub fn new<S>(store: S) -> Self
    where
        S: LockStore + 'static,
    {
        Self::with_store(Arc::new(store))
    }

    /// Creates a client over a store shared with other components.
    pub fn with_store(store: Arc<dyn LockStore>) -> Self {
        Self {
            store,
            flights: FlightGroup::default(),
        }
    }

    // == Try Lock ==
    /// Makes a single acquisition attempt with a fresh owner-id.
    ///
    /// Returns [`LockError::Busy`] if the key is already present.
    pub async fn try_lock(&self, key: &str, lease: Duration) -> LockResult<Lock> {
        let owner = new_owner_id();
        if !self.store.set_if_absent(key, &owner, lease).await? {
            return Err(LockError::Busy(key.to_string()));
        }
        debug!(key, owner = %owner, "Lock acquired");
        Ok(Lock::new(Arc::clone(&self.store), key, owner, lease))
    }

    // == Lock ==
    /// Acquires `key`, retrying per `retry` while the key is busy or an
    /// attempt times out.
    ///
    /// Each attempt is bounded by `attempt_timeout`. Store failures other
    /// than timeouts abort at once. When `retry` is exhausted the result is
    /// [`LockError::Failed`]; when `deadline` passes first it is
    /// [`LockError::DeadlineExceeded`].
    ///
    /// All attempts share one owner-id, so an attempt that timed out but did
    /// land in the store is recognized on the next try.
    pub async fn lock<R>(
        &self,
        key: &str,
        lease: Duration,
        attempt_timeout: Duration,
        mut retry: R,
        deadline: Option<Instant>,
    ) -> LockResult<Lock>
    where
        R: RetryStrategy,
    {
        let owner = new_owner_id();
        let mut attempts: u32 = 0;
        let mut maybe_landed = false;

        loop {
            attempts += 1;
            let attempt = time::timeout(
                attempt_timeout,
                self.acquire(key, &owner, lease, maybe_landed),
            );
            let outcome = match deadline {
                Some(deadline) => time::timeout_at(deadline, attempt)
                    .await
                    .map_err(|_| LockError::DeadlineExceeded)?,
                None => attempt.await,
            };

            match outcome {
                Ok(Ok(true)) => {
                    debug!(key, owner = %owner, attempts, "Lock acquired");
                    return Ok(Lock::new(Arc::clone(&self.store), key, owner, lease));
                }
                Ok(Ok(false)) => debug!(key, attempts, "Lock busy"),
                Ok(Err(err)) if err.is_timeout() => {
                    debug!(key, attempts, "Lock attempt timed out in store");
                    maybe_landed = true;
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    debug!(key, attempts, "Lock attempt exceeded {:?}", attempt_timeout);
                    maybe_landed = true;
                }
            }

            let Some(interval) = retry.next() else {
                return Err(LockError::Failed {
                    key: key.to_string(),
                    attempts,
                });
            };
            let wake = Instant::now() + interval;
            match deadline {
                Some(deadline) if deadline < wake => {
                    time::sleep_until(deadline).await;
                    return Err(LockError::DeadlineExceeded);
                }
                _ => time::sleep_until(wake).await,
            }
        }
    }

    // == Single-Flight Lock ==
    /// Like [`lock`](LockClient::lock), but concurrent calls for the same
    /// key within this client share one acquisition loop and its outcome.
    ///
    /// The loop runs on its own task with the first caller's parameters.
    /// A caller whose `deadline` passes gets [`LockError::DeadlineExceeded`]
    /// without disturbing the loop. Once the loop finishes the key is free
    /// again, so a later call starts a new acquisition.
    pub async fn singleflight_lock<R>(
        &self,
        key: &str,
        lease: Duration,
        attempt_timeout: Duration,
        retry: R,
        deadline: Option<Instant>,
    ) -> LockResult<Lock>
    where
        R: RetryStrategy + 'static,
    {
        let client = self.clone();
        let owned_key = key.to_string();
        let flight = self.flights.join(key, async move {
            client
                .lock(&owned_key, lease, attempt_timeout, retry, deadline)
                .await
        });

        let outcome = match deadline {
            Some(deadline) => time::timeout_at(deadline, flight)
                .await
                .map_err(|_| LockError::DeadlineExceeded)?,
            None => flight.await,
        };
        outcome.unwrap_or(Err(LockError::Canceled))
    }

    /// One acquisition attempt. After a timed-out attempt the key may
    /// already be ours, which a successful extend confirms.
    async fn acquire(
        &self,
        key: &str,
        owner: &str,
        lease: Duration,
        maybe_landed: bool,
    ) -> LockResult<bool> {
        if self.store.set_if_absent(key, owner, lease).await? {
            return Ok(true);
        }
        if maybe_landed {
            return Ok(self.store.compare_and_extend(key, owner, lease).await?);
        }
        Ok(false)
    }
}

fn new_owner_id() -> String {
    Uuid::new_v4().to_string()
}
