//! Release guard: safety margin and holder tokens

mod common;

use common::{manual_lock, CountingStore, START};
use kvlock::{Error, LeaseLock, LockOptions, LockStore, MemoryStore, Release};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_near_expiry_never_deletes() {
    for store in [CountingStore::plain(), CountingStore::conditional()] {
        let store = Arc::new(store);
        let (lock, clock) = manual_lock(store.clone(), LockOptions::default());
        let lease = lock.try_acquire_ms("jobs", 1000).await.unwrap().into_lease().unwrap();

        // now + margin lands 1ns past the expiry
        clock.advance(Duration::from_millis(900));
        let margin = Duration::from_nanos(100_000_001);

        assert_eq!(
            lock.release("jobs", margin).await.unwrap(),
            Release::NearExpiry {
                expiry_nanos: lease.expiry_nanos
            }
        );
        assert_eq!(
            lock.release_lease(&lease, margin).await.unwrap(),
            Release::NearExpiry {
                expiry_nanos: lease.expiry_nanos
            }
        );
        assert_eq!(CountingStore::count(&store.deletes), 0);
        assert!(store.get("jobs").await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_margin_boundary_allows_delete() {
    let store = Arc::new(CountingStore::plain());
    let (lock, clock) = manual_lock(store.clone(), LockOptions::default());
    lock.try_acquire_ms("jobs", 1000).await.unwrap();

    clock.advance(Duration::from_millis(900));
    let outcome = lock.release("jobs", Duration::from_millis(100)).await.unwrap();
    assert_eq!(outcome, Release::Released);
    assert_eq!(CountingStore::count(&store.deletes), 1);
}

#[tokio::test]
async fn test_missing_key_is_error_without_delete() {
    let store = Arc::new(CountingStore::plain());
    let lock = LeaseLock::new(store.clone());

    let err = lock.release_ms("never-locked", 0).await.unwrap_err();
    assert!(matches!(err, Error::LockNotFound(ref k) if k == "never-locked"));
    assert_eq!(CountingStore::count(&store.deletes), 0);
}

#[tokio::test]
async fn test_superseded_holder_cannot_delete_new_lease() {
    let store = Arc::new(MemoryStore::new());
    let (lock, clock) = manual_lock(store.clone(), LockOptions::default());

    let first = lock.try_acquire_ms("jobs", 100).await.unwrap().into_lease().unwrap();
    clock.advance(Duration::from_millis(150));
    let second = lock.try_acquire_ms("jobs", 1000).await.unwrap().into_lease().unwrap();

    // The delayed first holder wakes up while the new lease is far from expiry
    let outcome = lock.release_lease(&first, Duration::ZERO).await.unwrap();
    assert_eq!(outcome, Release::NotOwner);
    assert_eq!(store.get("jobs").await.unwrap(), Some(second.value().encode()));

    // The anonymous release has no such protection
    let outcome = lock.release("jobs", Duration::ZERO).await.unwrap();
    assert_eq!(outcome, Release::Released);
}

#[tokio::test]
async fn test_unfenced_leases_release_by_timing_only() {
    let store = Arc::new(MemoryStore::new());
    let options = LockOptions {
        fencing: false,
        ..Default::default()
    };
    let (lock, _clock) = manual_lock(store.clone(), options);

    let lease = lock.try_acquire_ms("jobs", 1000).await.unwrap().into_lease().unwrap();
    assert!(lease.token.is_none());
    assert_eq!(store.get("jobs").await.unwrap(), Some((START + 1_000_000_000).to_string()));

    let outcome = lock.release_lease(&lease, Duration::ZERO).await.unwrap();
    assert_eq!(outcome, Release::Released);
}

#[tokio::test]
async fn test_fenced_lease_against_legacy_value() {
    let store = Arc::new(MemoryStore::new());
    let (lock, _clock) = manual_lock(store.clone(), LockOptions::default());
    let lease = lock.try_acquire_ms("jobs", 1000).await.unwrap().into_lease().unwrap();

    // An anonymous client rewrote the entry with a bare expiry
    store.set("jobs", &(START + 2_000_000_000).to_string()).await.unwrap();

    let outcome = lock.release_lease(&lease, Duration::ZERO).await.unwrap();
    assert_eq!(outcome, Release::NotOwner);
}

#[tokio::test]
async fn test_release_reports_store_failure() {
    let store = Arc::new(MemoryStore::new());
    let lock = LeaseLock::new(store.clone());
    lock.try_acquire_ms("jobs", 1000).await.unwrap();
    store.close().await.unwrap();

    let err = lock.release_ms("jobs", 0).await.unwrap_err();
    assert!(err.is_store_error());
}
