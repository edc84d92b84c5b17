//! Single-Flight Module
//!
//! Coalesces concurrent work for the same key into one execution whose
//! output is delivered to every caller that joined while it ran.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

/// A shared handle on one in-flight execution.
///
/// Resolves to `None` if the task running the work died before producing
/// an output.
pub(crate) type Flight<T> = Shared<BoxFuture<'static, Option<T>>>;

type Registry<T> = Arc<Mutex<HashMap<String, Flight<T>>>>;

// == Flight Group ==
/// Key-indexed registry of in-flight executions.
///
/// The first caller for a key spawns the work on its own task, so callers
/// that stop waiting never cancel it. The key is cleared as soon as the work
/// finishes; a later call starts a new execution.
pub(crate) struct FlightGroup<T> {
    calls: Registry<T>,
}

impl<T> Clone for FlightGroup<T> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<T> Default for FlightGroup<T> {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
        }
    }
}

/// Removes the registry entry when the leader task ends, however it ends.
struct ClearOnExit<T> {
    calls: Registry<T>,
    key: String,
}

impl<T> Drop for ClearOnExit<T> {
    fn drop(&mut self) {
        self.calls.lock().remove(&self.key);
    }
}

impl<T> FlightGroup<T>
where
    T: Clone + Send + Sync + 'static,
{
    // == Join ==
    /// Returns the in-flight execution for `key`, starting `work` as a new
    /// one if none is running. `work` is dropped unused when joining.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn join<F>(&self, key: &str, work: F) -> Flight<T>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let mut calls = self.calls.lock();
        if let Some(flight) = calls.get(key) {
            return flight.clone();
        }

        let guard = ClearOnExit {
            calls: Arc::clone(&self.calls),
            key: key.to_string(),
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            work.await
        });
        let flight = async move { handle.await.ok() }.boxed().shared();

        calls.insert(key.to_string(), flight.clone());
        flight
    }

    /// Whether an execution for `key` is currently registered.
    #[cfg(test)]
    pub fn in_flight(&self, key: &str) -> bool {
        self.calls.lock().contains_key(key)
    }
}
