//! Reservation protocol over a custom resource

use std::sync::atomic::{AtomicUsize, Ordering};

use atlasbytes::config;
use atlasbytes::refcount::{RefCount, ReleaseOutcome};
use atlasbytes::{BytesError, OwnerId, ReferenceCounted};

// =============================================================================
// Helper Types
// =============================================================================

/// Resource that counts its teardowns
struct Tracked {
    refs: RefCount,
    teardowns: AtomicUsize,
}

impl Tracked {
    fn new(owner: OwnerId) -> Self {
        Self {
            refs: RefCount::new("tracked", owner),
            teardowns: AtomicUsize::new(0),
        }
    }

    fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

impl ReferenceCounted for Tracked {
    fn refs(&self) -> &RefCount {
        &self.refs
    }

    fn perform_release(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_n_reserves_and_releases_tear_down_once() {
    config::set_owner_tracing(true);
    let creator = OwnerId::new("creator");
    let resource = Tracked::new(creator);

    let owners: Vec<OwnerId> = (0..5).map(|_| OwnerId::new("user")).collect();
    for &owner in &owners {
        resource.reserve(owner).unwrap();
    }
    assert_eq!(resource.ref_count(), 6);

    for &owner in &owners {
        resource.release(owner).unwrap();
        assert_eq!(resource.teardowns(), 0);
    }
    resource.release(creator).unwrap();
    assert_eq!(resource.teardowns(), 1);
    assert!(resource.is_released());

    assert!(matches!(resource.release(creator), Err(BytesError::Released(_))));
    assert!(resource.reserve(OwnerId::new("late")).is_err());
    assert_eq!(resource.teardowns(), 1);
}

#[test]
fn test_release_by_stranger_is_unmatched() {
    config::set_owner_tracing(true);
    let creator = OwnerId::new("creator");
    let resource = Tracked::new(creator);

    let stranger = OwnerId::new("stranger");
    assert!(matches!(
        resource.release(stranger),
        Err(BytesError::UnmatchedRelease { .. })
    ));
    assert_eq!(resource.ref_count(), 1);
    assert!(resource.reserved_by(creator));
    assert!(!resource.reserved_by(stranger));
}

#[test]
fn test_release_last_refuses_while_shared() {
    let creator = OwnerId::new("creator");
    let other = OwnerId::new("other");
    let resource = Tracked::new(creator);
    resource.reserve(other).unwrap();

    assert!(resource.release_last(creator).is_err());
    assert_eq!(resource.ref_count(), 2);

    resource.release(other).unwrap();
    resource.release_last(creator).unwrap();
    assert_eq!(resource.teardowns(), 1);
}

#[test]
fn test_closed_counter_keeps_existing_holders() {
    let creator = OwnerId::new("creator");
    let counter = RefCount::new("closable", creator);
    assert!(counter.close());
    assert!(!counter.close());

    assert!(matches!(counter.reserve(OwnerId::new("new")), Err(BytesError::Closed(_))));
    assert!(!counter.try_reserve(OwnerId::new("new")));
    assert_eq!(counter.release(creator).unwrap(), ReleaseOutcome::Freed);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_reserve_release_tears_down_once() {
    let creator = OwnerId::new("creator");
    let resource = Tracked::new(creator);

    crossbeam::scope(|s| {
        for _ in 0..8 {
            let resource = &resource;
            s.spawn(move |_| {
                for _ in 0..500 {
                    let owner = OwnerId::new("worker");
                    resource.reserve(owner).unwrap();
                    resource.release(owner).unwrap();
                }
            });
        }
    })
    .unwrap();

    assert_eq!(resource.ref_count(), 1);
    assert_eq!(resource.teardowns(), 0);
    resource.release(creator).unwrap();
    assert_eq!(resource.teardowns(), 1);
}
