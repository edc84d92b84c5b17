//! Integration Tests for the Local Caches
//!
//! Exercises the public expiring map and capacity guard APIs end to end.

use std::sync::Arc;
use std::time::Duration;

use lease_cache::cache::{Cache, CapacityGuard, ExpiringMap};
use lease_cache::{CacheError, Config};
use parking_lot::Mutex;
use tokio::time::sleep;

// == Helper Functions ==

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("lease_cache=debug")
        .with_test_writer()
        .try_init();
}

// == Expiring Map Scenarios ==

#[tokio::test(start_paused = true)]
async fn test_entry_expires_after_ttl() {
    init_tracing();
    let map = ExpiringMap::new(Duration::from_secs(10));

    map.set("a", 1, Duration::from_secs(1)).await.unwrap();
    assert_eq!(map.get("a").await.unwrap(), 1);

    sleep(Duration::from_secs(2)).await;

    assert_eq!(map.get("a").await, Err(CacheError::NotFound("a".to_string())));
}

#[tokio::test(start_paused = true)]
async fn test_sweep_reports_every_expired_entry_once() {
    init_tracing();
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&evicted);
    let map = ExpiringMap::builder()
        .sweep_interval(Duration::from_millis(100))
        .max_scan_per_tick(4)
        .on_evict(move |key: &str, value: &u32| sink.lock().push((key.to_string(), *value)))
        .build();

    for i in 0..20u32 {
        map.set(&format!("short{}", i), i, Duration::from_millis(50))
            .await
            .unwrap();
    }
    map.set("forever", 99, Duration::ZERO).await.unwrap();

    // 21 keys at 4 per tick need at most 6 ticks to cover everything
    sleep(Duration::from_secs(1)).await;

    assert_eq!(map.len().await, 1);
    let mut removed: Vec<u32> = evicted.lock().iter().map(|(_, v)| *v).collect();
    removed.sort_unstable();
    assert_eq!(removed, (0..20).collect::<Vec<_>>());
    assert_eq!(map.get("forever").await.unwrap(), 99);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_readers_and_writers() {
    let map = Arc::new(ExpiringMap::builder().sweep_interval(Duration::ZERO).build());

    let writers: Vec<_> = (0..10)
        .map(|i| {
            let map = Arc::clone(&map);
            tokio::spawn(async move {
                for round in 0..10 {
                    map.set(&format!("k{}", i), round, Duration::from_secs(60))
                        .await
                        .unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    for i in 0..10 {
        assert_eq!(map.get(&format!("k{}", i)).await.unwrap(), 9);
    }
    assert_eq!(map.stats().await.evictions, 0);
}

#[tokio::test(start_paused = true)]
async fn test_close_then_close_again() {
    let map: ExpiringMap<String> = ExpiringMap::new(Duration::from_secs(1));

    map.close().unwrap();
    assert_eq!(map.close(), Err(CacheError::AlreadyClosed));

    // Operations keep working without the sweep
    map.set("k", "v".to_string(), Duration::ZERO).await.unwrap();
    assert_eq!(map.get("k").await.unwrap(), "v");
}

// == Capacity Guard Scenarios ==

#[tokio::test(start_paused = true)]
async fn test_capacity_guard_scenario() {
    let cache = CapacityGuard::new(ExpiringMap::builder(), 1);

    cache.set("a", 1, Duration::ZERO).await.unwrap();
    assert_eq!(
        cache.set("b", 2, Duration::ZERO).await,
        Err(CacheError::CapacityExceeded { max: 1 })
    );

    cache.delete("a").await.unwrap();
    cache.set("b", 2, Duration::ZERO).await.unwrap();
    assert_eq!(cache.get("b").await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_guard_from_config_as_cache_trait() {
    let config = Config {
        sweep_interval_ms: 100,
        max_entries: 2,
        ..Config::default()
    };
    let guard: CapacityGuard<String> = CapacityGuard::new(config.map_builder(), config.max_entries);
    let cache: Arc<dyn Cache<String>> = Arc::new(guard);

    cache.set("a", "1".to_string(), Duration::from_millis(50)).await.unwrap();
    cache.set("b", "2".to_string(), Duration::ZERO).await.unwrap();
    assert!(cache.set("c", "3".to_string(), Duration::ZERO).await.is_err());

    // The sweep frees the expired slot
    sleep(Duration::from_millis(300)).await;
    cache.set("c", "3".to_string(), Duration::ZERO).await.unwrap();
    assert_eq!(cache.get("c").await.unwrap(), "3");
}
