use super::*;
use crate::error::CatalogError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Helper to build a cache driven by a manual clock
fn create_test_cache(ttl_secs: u64, max_entries: usize) -> (TtlCache<u32>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let cache = TtlCache::with_clock(Duration::from_secs(ttl_secs), max_entries, clock.clone());
    (cache, clock)
}

#[test]
fn test_get_returns_fresh_value() {
    let (cache, clock) = create_test_cache(600, 4);
    cache.insert("all_products", 7);

    clock.advance(Duration::from_secs(599));
    assert_eq!(cache.get("all_products"), Some(7));
}

#[test]
fn test_expired_entry_is_absent() {
    let (cache, clock) = create_test_cache(600, 4);
    cache.insert("all_products", 7);

    clock.advance(Duration::from_secs(601));
    assert_eq!(cache.get("all_products"), None);
    assert!(cache.is_empty());
}

#[test]
fn test_entry_at_exact_ttl_is_expired() {
    let (cache, clock) = create_test_cache(10, 4);
    cache.insert("k", 1);
    clock.advance(Duration::from_secs(10));
    assert_eq!(cache.get("k"), None);
}

#[test]
fn test_insert_resets_age() {
    let (cache, clock) = create_test_cache(10, 4);
    cache.insert("k", 1);
    clock.advance(Duration::from_secs(8));
    cache.insert("k", 2);
    clock.advance(Duration::from_secs(8));
    assert_eq!(cache.get("k"), Some(2));
}

#[test]
fn test_capacity_evicts_oldest_insert() {
    let (cache, _clock) = create_test_cache(600, 2);
    cache.insert("a", 1);
    cache.insert("b", 2);
    cache.insert("c", 3);

    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.get("b"), Some(2));
    assert_eq!(cache.get("c"), Some(3));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_overwrite_does_not_evict() {
    let (cache, _clock) = create_test_cache(600, 2);
    cache.insert("a", 1);
    cache.insert("b", 2);
    cache.insert("a", 3);

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("a"), Some(3));
    assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn test_expired_entries_free_capacity() {
    let (cache, clock) = create_test_cache(10, 2);
    cache.insert("a", 1);
    cache.insert("b", 2);
    clock.advance(Duration::from_secs(11));
    cache.insert("c", 3);

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn test_cache_stats() {
    let (cache, _clock) = create_test_cache(600, 4);
    cache.insert("a", 1);
    cache.get("a");
    cache.get("a");
    cache.get("missing");

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_ratio() - 2.0 / 3.0).abs() < 1e-9);

    cache.reset_stats();
    assert_eq!(cache.stats(), CacheStats::default());
    assert_eq!(CacheStats::default().hit_ratio(), 0.0);
}

#[test]
fn test_remove_and_clear() {
    let (cache, _clock) = create_test_cache(600, 4);
    cache.insert("a", 1);
    cache.insert("b", 2);

    assert_eq!(cache.remove("a"), Some(1));
    assert_eq!(cache.remove("a"), None);
    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_cache_keys() {
    assert_eq!(ALL_PRODUCTS_KEY, "all_products");
    assert_eq!(product_page_key(2, 50), "products:page=2:per_page=50");
}

#[tokio::test]
async fn test_single_flight_coalesces_concurrent_callers() {
    let flight: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let flight = flight.clone();
        let runs = runs.clone();
        let gate = gate.clone();
        handles.push(tokio::spawn(async move {
            flight
                .run("all_products", move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    gate.notified().await;
                    Ok(42)
                })
                .await
        }));
    }

    // Let every caller register before the work completes
    while flight.in_flight() == 0 {
        tokio::task::yield_now().await;
    }
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    gate.notify_one();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 42);
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(flight.in_flight(), 0);
}

#[tokio::test]
async fn test_single_flight_shares_failure_and_releases_key() {
    let flight: SingleFlight<u32> = SingleFlight::new();

    let result = flight
        .run("k", || async {
            Err(CatalogError::Upstream {
                status: 503,
                body: "busy".to_string(),
            })
        })
        .await;
    assert!(matches!(result, Err(CatalogError::Upstream { status: 503, .. })));
    assert_eq!(flight.in_flight(), 0);

    // A later call starts fresh work
    let result = flight.run("k", || async { Ok(5) }).await;
    assert_eq!(result.unwrap(), 5);
}

#[tokio::test]
async fn test_single_flight_distinct_keys_run_independently() {
    let flight: SingleFlight<String> = SingleFlight::new();
    let a = flight.run("a", || async { Ok("a".to_string()) });
    let b = flight.run("b", || async { Ok("b".to_string()) });
    let (a, b) = tokio::join!(a, b);
    assert_eq!(a.unwrap(), "a");
    assert_eq!(b.unwrap(), "b");
}

#[tokio::test]
async fn test_single_flight_survives_caller_cancellation() {
    let flight: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
    let completed = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    let leader = {
        let flight = flight.clone();
        let completed = completed.clone();
        let gate = gate.clone();
        tokio::spawn(async move {
            flight
                .run("k", move || async move {
                    gate.notified().await;
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .await
        })
    };

    while flight.in_flight() == 0 {
        tokio::task::yield_now().await;
    }
    leader.abort();
    gate.notify_one();

    while flight.in_flight() != 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}
