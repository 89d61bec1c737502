//! Tests for LockService
//!
//! These tests verify:
//! - Write lock acquire/release and mutual exclusion
//! - Shared read locks and reader/writer exclusion
//! - Lease normalization and expiry
//! - Usage and domain errors
//! - Deadlines, cancellation and guards

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use redis_rwlock::coordinator::Backoff;
use redis_rwlock::protocol::{Operation, MAX_LEASE_SECS};
use redis_rwlock::{Config, LockError, LockService, MemoryStore, Wait};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_service() -> (MemoryStore, LockService<MemoryStore>) {
    let store = MemoryStore::new();
    let service = LockService::with_connector(Config::default(), store.clone()).unwrap();
    (store, service)
}

fn setup_shared_service() -> (MemoryStore, Arc<LockService<MemoryStore>>) {
    let (store, service) = setup_service();
    (store, Arc::new(service))
}

fn short_wait() -> Wait {
    Wait::timeout(Duration::from_millis(80))
}

// =============================================================================
// Write Lock Tests
// =============================================================================

#[test]
fn test_acquire_then_release_write() {
    let (store, service) = setup_service();

    service.acquire_write("orders", "h1", 5).unwrap();
    assert_eq!(store.writer("orders"), Some("h1".to_string()));

    service.release_write("orders", "h1").unwrap();
    assert_eq!(store.writer("orders"), None);
}

#[test]
fn test_second_writer_waits_for_release() {
    let (store, service) = setup_shared_service();
    service.acquire_write("inventory:42", "orderA", 5).unwrap();

    let acquired = Arc::new(AtomicBool::new(false));
    let contender = {
        let service = Arc::clone(&service);
        let acquired = Arc::clone(&acquired);
        thread::spawn(move || {
            service.acquire_write("inventory:42", "orderB", 5).unwrap();
            acquired.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(150));
    assert!(!acquired.load(Ordering::SeqCst));
    assert_eq!(store.writer("inventory:42"), Some("orderA".to_string()));

    let released_at = Instant::now();
    service.release_write("inventory:42", "orderA").unwrap();
    contender.join().unwrap();

    assert!(acquired.load(Ordering::SeqCst));
    assert_eq!(store.writer("inventory:42"), Some("orderB".to_string()));
    assert!(released_at.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_second_writer_times_out() {
    let (store, service) = setup_service();
    service.acquire_write("k", "h1", 5).unwrap();

    let err = service.acquire_write_with("k", "h2", 5, &short_wait()).unwrap_err();

    assert!(matches!(err, LockError::Timeout { op: Operation::Lock, .. }));
    assert_eq!(store.writer("k"), Some("h1".to_string()));
}

#[test]
fn test_reacquire_by_same_holder_renews() {
    let (store, service) = setup_service();

    service.acquire_write("k", "h1", 5).unwrap();
    service.acquire_write_with("k", "h1", 5, &short_wait()).unwrap();

    assert_eq!(store.writer("k"), Some("h1".to_string()));
}

#[test]
fn test_writers_are_mutually_exclusive() {
    let (_store, service) = setup_shared_service();
    let inside = Arc::new(AtomicUsize::new(0));
    let entries = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let service = Arc::clone(&service);
            let inside = Arc::clone(&inside);
            let entries = Arc::clone(&entries);
            thread::spawn(move || {
                let holder = format!("worker-{}", i);
                for _ in 0..5 {
                    service.acquire_write("shared", &holder, 5).unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    entries.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(1));
                    inside.fetch_sub(1, Ordering::SeqCst);
                    service.release_write("shared", &holder).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(entries.load(Ordering::SeqCst), 20);
}

// =============================================================================
// Release Semantics Tests
// =============================================================================

#[test]
fn test_release_unheld_write_is_noop() {
    let (store, service) = setup_service();

    service.release_write("free", "nobody").unwrap();

    assert_eq!(store.writer("free"), None);
    service.acquire_write_with("free", "h1", 5, &short_wait()).unwrap();
}

#[test]
fn test_release_by_other_holder_keeps_lock() {
    let (store, service) = setup_service();
    service.acquire_write("k", "owner", 5).unwrap();

    service.release_write("k", "intruder").unwrap();

    assert_eq!(store.writer("k"), Some("owner".to_string()));
    let err = service.acquire_write_with("k", "intruder", 5, &short_wait()).unwrap_err();
    assert!(matches!(err, LockError::Timeout { .. }));
}

// =============================================================================
// Lease Tests
// =============================================================================

#[test]
fn test_lease_expiry_frees_lock() {
    let (_store, service) = setup_service();
    service.acquire_write("lease", "h1", 1).unwrap();

    let start = Instant::now();
    service
        .acquire_write_with("lease", "h2", 5, &Wait::timeout(Duration::from_secs(5)))
        .unwrap();

    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[test]
fn test_non_positive_lease_uses_default() {
    let (store, service) = setup_service();

    service.acquire_write("zero", "h1", 0).unwrap();
    service.acquire_write("negative", "h1", -3).unwrap();

    // A 5s default outlives the wait; a zero lease would have been rejected
    assert!(service.acquire_write_with("zero", "h2", 5, &short_wait()).is_err());
    assert!(service.acquire_write_with("negative", "h2", 5, &short_wait()).is_err());
    assert_eq!(store.writer("zero"), Some("h1".to_string()));
}

#[test]
fn test_oversized_lease_is_capped() {
    let (store, service) = setup_service();

    service.acquire_write("huge", "h1", i64::MAX).unwrap();
    service.acquire_write("max", "h1", MAX_LEASE_SECS + 1).unwrap();

    assert_eq!(store.writer("huge"), Some("h1".to_string()));
    assert!(service.acquire_write_with("huge", "h2", 5, &short_wait()).is_err());

    service.release_write("huge", "h1").unwrap();
    service.release_write("max", "h1").unwrap();
    assert_eq!(store.writer("huge"), None);
    assert_eq!(store.writer("max"), None);
}

// =============================================================================
// Read Lock Tests
// =============================================================================

#[test]
fn test_concurrent_readers() {
    let (store, service) = setup_shared_service();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || service.acquire_read("catalog").unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.readers("catalog"), 8);

    for _ in 0..8 {
        service.release_read("catalog").unwrap();
    }
    assert_eq!(store.readers("catalog"), 0);
}

#[test]
fn test_reader_waits_for_writer() {
    let (_store, service) = setup_service();
    service.acquire_write("k", "w", 5).unwrap();

    let err = service.acquire_read_with("k", &short_wait()).unwrap_err();
    assert!(matches!(err, LockError::Timeout { op: Operation::RLock, .. }));

    service.release_write("k", "w").unwrap();
    service.acquire_read_with("k", &short_wait()).unwrap();
}

#[test]
fn test_writer_waits_for_readers() {
    let (store, service) = setup_service();
    service.acquire_read("k").unwrap();
    service.acquire_read("k").unwrap();

    assert!(service.acquire_write_with("k", "w", 5, &short_wait()).is_err());

    service.release_read("k").unwrap();
    assert!(service.acquire_write_with("k", "w", 5, &short_wait()).is_err());

    service.release_read("k").unwrap();
    service.acquire_write_with("k", "w", 5, &short_wait()).unwrap();
    assert_eq!(store.writer("k"), Some("w".to_string()));
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_acquire_write_empty_key() {
    let (_store, service) = setup_service();

    let err = service.acquire_write("", "h1", 5).unwrap_err();

    assert!(matches!(err, LockError::EmptyKey { op: Operation::Lock }));
    assert!(err.is_usage());
}

#[test]
fn test_release_read_empty_key() {
    let (_store, service) = setup_service();

    let err = service.release_read("").unwrap_err();

    assert!(matches!(err, LockError::EmptyKey { op: Operation::RUnlock }));
}

#[test]
fn test_empty_holder_is_domain_error() {
    let (store, service) = setup_service();

    let err = service.acquire_write("k", "", 5).unwrap_err();

    match err {
        LockError::Domain { op, key, message } => {
            assert_eq!(op, Operation::Lock);
            assert_eq!(key, "k");
            assert!(message.contains("holder"));
        }
        other => panic!("Expected domain error, got {:?}", other),
    }
    assert_eq!(store.writer("k"), None);
}

#[test]
fn test_release_read_without_share_is_domain_error() {
    let (_store, service) = setup_service();

    let err = service.release_read("never-read").unwrap_err();

    assert!(matches!(err, LockError::Domain { op: Operation::RUnlock, .. }));
}

#[test]
fn test_acquire_read_retries_domain_errors() {
    let (store, service) = setup_service();
    store.reject_next_calls(3);

    service
        .acquire_read_with("k", &Wait::timeout(Duration::from_secs(5)))
        .unwrap();

    assert_eq!(store.readers("k"), 1);
}

#[test]
fn test_release_write_domain_error_is_fatal() {
    let (store, service) = setup_service();
    service.acquire_write("k", "h1", 5).unwrap();
    store.reject_next_calls(3);

    let err = service.release_write("k", "h1").unwrap_err();

    match err {
        LockError::Domain { op, key, message } => {
            assert_eq!(op, Operation::Unlock);
            assert_eq!(key, "k");
            assert_eq!(message, "injected rejection");
        }
        other => panic!("Expected domain error, got {:?}", other),
    }
    assert_eq!(store.writer("k"), Some("h1".to_string()));

    // Each call gives up on its first rejection
    assert!(service.release_write("k", "h1").is_err());
    assert!(service.release_write("k", "h1").is_err());
    service.release_write("k", "h1").unwrap();
    assert_eq!(store.writer("k"), None);
}

#[test]
fn test_acquire_write_domain_error_is_fatal() {
    let (store, service) = setup_service();
    store.reject_next_calls(1);

    let err = service.acquire_write("k", "h1", 5).unwrap_err();

    assert!(matches!(err, LockError::Domain { op: Operation::Lock, .. }));
    assert_eq!(store.writer("k"), None);
}

// =============================================================================
// Wait Tests
// =============================================================================

#[test]
fn test_cancelled_acquire() {
    let (_store, service) = setup_service();
    service.acquire_write("k", "h1", 5).unwrap();

    let flag = Arc::new(AtomicBool::new(false));
    let setter = {
        let flag = Arc::clone(&flag);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            flag.store(true, Ordering::SeqCst);
        })
    };

    let err = service
        .acquire_write_with("k", "h2", 5, &Wait::forever().cancel_on(flag))
        .unwrap_err();
    setter.join().unwrap();

    assert!(matches!(err, LockError::Cancelled { op: Operation::Lock, .. }));
}

#[test]
fn test_backoff_stays_in_range() {
    let backoff = Backoff::new(10, 20);

    for _ in 0..100 {
        let delay = backoff.delay();
        assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(20));
    }
}

#[test]
fn test_deadline_not_overshot() {
    let (_store, service) = setup_service();
    service.acquire_write("k", "h1", 5).unwrap();

    let start = Instant::now();
    let wait = Wait::until(start + Duration::from_millis(30));
    assert!(service.acquire_write_with("k", "h2", 5, &wait).is_err());

    assert!(start.elapsed() < Duration::from_millis(500));
}

// =============================================================================
// Guard Tests
// =============================================================================

#[test]
fn test_write_guard_releases_on_drop() {
    let (store, service) = setup_service();

    {
        let guard = service.lock_write("g", "h1", 5).unwrap();
        assert_eq!(guard.key(), "g");
        assert_eq!(guard.holder(), "h1");
        assert_eq!(store.writer("g"), Some("h1".to_string()));
    }

    assert_eq!(store.writer("g"), None);
}

#[test]
fn test_read_guard_explicit_release() {
    let (store, service) = setup_service();

    let first = service.lock_read("g").unwrap();
    let second = service.lock_read("g").unwrap();
    assert_eq!(store.readers("g"), 2);

    first.release().unwrap();
    assert_eq!(store.readers("g"), 1);

    drop(second);
    assert_eq!(store.readers("g"), 0);
}
