//! Lock Handle Module
//!
//! A held distributed lock: unlock, one-shot refresh and the cooperative
//! auto-refresh loop.

use std::fmt;
use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::{LockError, LockResult};
use crate::lock::LockStore;

// == Lock ==
/// Proof of ownership of `key` in the external store for up to `lease`.
///
/// Cloning yields another handle on the same ownership; single-flight
/// followers receive such clones.
#[derive(Clone)]
pub struct Lock {
    inner: Arc<LockInner>,
}

struct LockInner {
    store: Arc<dyn LockStore>,
    key: String,
    owner: String,
    lease: Duration,
    /// Single-slot stop signal for the auto-refresh loop
    stop_tx: mpsc::Sender<()>,
    stop_rx: Mutex<mpsc::Receiver<()>>,
}

impl Lock {
    pub(crate) fn new(store: Arc<dyn LockStore>, key: &str, owner: String, lease: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel(1);
        Self {
            inner: Arc::new(LockInner {
                store,
                key: key.to_string(),
                owner,
                lease,
                stop_tx,
                stop_rx: Mutex::new(stop_rx),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// The random owner-id this lock was acquired with.
    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    pub fn lease(&self) -> Duration {
        self.inner.lease
    }

    // == Unlock ==
    /// Releases the lock if the store still maps the key to this owner.
    ///
    /// Whatever the outcome, a running auto-refresh loop is asked to stop.
    /// At most one stop signal is ever pending.
    pub async fn unlock(&self) -> LockResult<()> {
        let _ = self.inner.stop_tx.try_send(());

        let released = self
            .inner
            .store
            .compare_and_delete(&self.inner.key, &self.inner.owner)
            .await?;
        if !released {
            return Err(LockError::NotHeld(self.inner.key.clone()));
        }
        debug!(key = %self.inner.key, "Lock released");
        Ok(())
    }

    // == Refresh ==
    /// Resets the lease to its full duration.
    ///
    /// Returns [`LockError::NotHeld`] if the lease was already lost.
    pub async fn refresh(&self) -> LockResult<()> {
        let extended = self
            .inner
            .store
            .compare_and_extend(&self.inner.key, &self.inner.owner, self.inner.lease)
            .await?;
        if !extended {
            return Err(LockError::NotHeld(self.inner.key.clone()));
        }
        Ok(())
    }

    // == Auto Refresh ==
    /// Refreshes the lease every `interval` until [`unlock`](Lock::unlock)
    /// is called or a refresh fails.
    ///
    /// Each refresh is bounded by `call_timeout`. A timed-out refresh is
    /// retried immediately instead of waiting for the next tick; any other
    /// failure, including [`LockError::NotHeld`], ends the loop with that
    /// error. Run this on its own task next to the protected work.
    ///
    /// One loop per lock: clones share a single stop signal, so a second
    /// loop only starts once the first has ended, and after `unlock` it
    /// ends with [`LockError::NotHeld`] instead of `Ok(())`.
    ///
    /// A zero `interval` is rejected with [`LockError::ZeroInterval`].
    pub async fn auto_refresh(&self, interval: Duration, call_timeout: Duration) -> LockResult<()> {
        if interval.is_zero() {
            return Err(LockError::ZeroInterval);
        }
        let mut stop = self.inner.stop_rx.lock().await;
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut retry_now = false;

        loop {
            tokio::select! {
                biased;
                _ = stop.recv() => {
                    debug!(key = %self.inner.key, "Auto-refresh stopped");
                    return Ok(());
                }
                _ = ticker.tick(), if !retry_now => {}
                _ = future::ready(()), if retry_now => {}
            }

            match time::timeout(call_timeout, self.refresh()).await {
                Ok(Ok(())) => retry_now = false,
                Ok(Err(err)) if err.is_timeout() => {
                    warn!(key = %self.inner.key, "Lease refresh timed out in store, retrying");
                    retry_now = true;
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    warn!(key = %self.inner.key, "Lease refresh exceeded {:?}, retrying", call_timeout);
                    retry_now = true;
                }
            }
        }
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("key", &self.inner.key)
            .field("owner", &self.inner.owner)
            .field("lease", &self.inner.lease)
            .finish()
    }
}
