//! Expiration Sweep Task
//!
//! Background task that periodically removes expired map entries.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::store::Inner;

/// Spawns the sweep task for one map.
///
/// Each tick takes the map's exclusive section once and inspects at most the
/// map's `max_scan_per_tick` entries. The task ends when `stop` fires, when
/// its sender is dropped, or when the map itself has been dropped.
///
/// # Arguments
/// * `map` - Weak reference to the map's shared state
/// * `interval` - Time between ticks, must be non-zero
/// * `stop` - Fired once by `ExpiringMap::close`
pub(crate) fn spawn_sweep_task<V>(
    map: Weak<Inner<V>>,
    interval: Duration,
    mut stop: oneshot::Receiver<()>,
) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Starting expiration sweep with interval of {:?}", interval);

        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut stop => {
                    info!("Expiration sweep stopped");
                    return;
                }
            }

            let Some(inner) = map.upgrade() else {
                debug!("Expiration sweep exiting: map dropped");
                return;
            };
            let removed = inner.sweep_expired().await;
            drop(inner);

            if removed > 0 {
                info!("Expiration sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiration sweep: no expired entries found");
            }
        }
    })
}
