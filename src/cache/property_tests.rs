//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the map against a simple reference model.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;

use crate::cache::{CapacityGuard, ExpiringMap};
use crate::error::CacheError;

// == Strategies ==
/// Small key space so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]".prop_map(|s| s)
}

/// TTL in milliseconds, 0 = never expire
fn ttl_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![Just(0u64), 1u64..500]
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: i32, ttl_ms: u64 },
    Get { key: String },
    Delete { key: String },
    LoadAndDelete { key: String },
    Advance { ms: u64 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), any::<i32>(), ttl_strategy())
            .prop_map(|(key, value, ttl_ms)| CacheOp::Set { key, value, ttl_ms }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Delete { key }),
        key_strategy().prop_map(|key| CacheOp::LoadAndDelete { key }),
        (1u64..300).prop_map(|ms| CacheOp::Advance { ms }),
    ]
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

/// Reference entry: value and absolute deadline in virtual milliseconds
type ModelEntry = (i32, Option<u64>);

fn is_expired(entry: &ModelEntry, now_ms: u64) -> bool {
    entry.1.is_some_and(|deadline| deadline < now_ms)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Every removal path reports the removed value to the callback exactly once,
    // and reads agree with a deadline model.
    #[test]
    fn prop_eviction_callback_completeness(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let rt = paused_runtime();
        rt.block_on(async {
            let evicted = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&evicted);
            let map = ExpiringMap::builder()
                .sweep_interval(Duration::ZERO)
                .on_evict(move |key: &str, value: &i32| sink.lock().push((key.to_string(), *value)))
                .build();

            let mut model: HashMap<String, ModelEntry> = HashMap::new();
            let mut expected = Vec::new();
            let mut now_ms = 0u64;

            for op in ops {
                match op {
                    CacheOp::Set { key, value, ttl_ms } => {
                        map.set(&key, value, Duration::from_millis(ttl_ms)).await.unwrap();
                        let deadline = (ttl_ms > 0).then_some(now_ms + ttl_ms);
                        model.insert(key, (value, deadline));
                    }
                    CacheOp::Get { key } => {
                        let got = map.get(&key).await;
                        match model.get(&key).copied() {
                            Some(entry) if !is_expired(&entry, now_ms) => {
                                prop_assert_eq!(got, Ok(entry.0));
                            }
                            Some(entry) => {
                                prop_assert_eq!(got, Err(CacheError::NotFound(key.clone())));
                                model.remove(&key);
                                expected.push((key, entry.0));
                            }
                            None => {
                                prop_assert_eq!(got, Err(CacheError::NotFound(key.clone())));
                            }
                        }
                    }
                    CacheOp::Delete { key } => {
                        map.delete(&key).await.unwrap();
                        if let Some(entry) = model.remove(&key) {
                            expected.push((key, entry.0));
                        }
                    }
                    CacheOp::LoadAndDelete { key } => {
                        let got = map.load_and_delete(&key).await;
                        match model.remove(&key) {
                            Some(entry) => {
                                prop_assert_eq!(got, Ok(entry.0));
                                expected.push((key, entry.0));
                            }
                            None => prop_assert!(got.is_err()),
                        }
                    }
                    CacheOp::Advance { ms } => {
                        tokio::time::advance(Duration::from_millis(ms)).await;
                        now_ms += ms;
                    }
                }
            }

            prop_assert_eq!(&*evicted.lock(), &expected);
            prop_assert_eq!(map.len().await, model.len());
            Ok(())
        })?;
    }

    // The guard never holds more than `max` keys, and a rejected set changes nothing.
    #[test]
    fn prop_capacity_enforcement(
        ops in prop::collection::vec(cache_op_strategy(), 1..80),
        max_entries in 1usize..4
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let builder = ExpiringMap::builder()
                .sweep_interval(Duration::from_millis(100))
                .max_scan_per_tick(2);
            let cache = CapacityGuard::new(builder, max_entries);

            for op in ops {
                match op {
                    CacheOp::Set { key, value, ttl_ms } => {
                        let before = cache.len();
                        let existed = cache.stats().await.total_entries;
                        match cache.set(&key, value, Duration::from_millis(ttl_ms)).await {
                            Ok(()) => {}
                            Err(CacheError::CapacityExceeded { max }) => {
                                prop_assert_eq!(max, max_entries);
                                prop_assert_eq!(cache.len(), before);
                                prop_assert_eq!(cache.stats().await.total_entries, existed);
                                prop_assert!(cache.get(&key).await.is_err());
                            }
                            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                        }
                    }
                    CacheOp::Get { key } => {
                        let _ = cache.get(&key).await;
                    }
                    CacheOp::Delete { key } => {
                        cache.delete(&key).await.unwrap();
                    }
                    CacheOp::LoadAndDelete { key } => {
                        let _ = cache.load_and_delete(&key).await;
                    }
                    CacheOp::Advance { ms } => {
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                    }
                }

                prop_assert!(cache.len() <= max_entries, "{} > {}", cache.len(), max_entries);
                prop_assert_eq!(cache.len(), cache.stats().await.total_entries);
            }
            Ok(())
        })?;
    }
}
