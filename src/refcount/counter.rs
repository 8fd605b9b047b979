//! Reservation counter
//!
//! CAS-based reference count with optional owner tracing. The counter never
//! frees anything itself: `release` reports `ReleaseOutcome::Freed` exactly
//! once, on the 1 → 0 transition, and the resource performs its teardown.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crossbeam::utils::CachePadded;
use parking_lot::Mutex;

use crate::config;
use crate::error::{BytesError, Result};

use super::OwnerId;

/// Result of a successful release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Other reservations remain (count after the release).
    Retained(u32),
    /// That was the last reservation; tear the resource down now.
    Freed,
}

/// Reference count shared by regions, mapped files and buffers
///
/// ## Concurrency:
/// - `count`: CAS loop, a count of zero can never be revived
/// - `owners`: short mutex, only present when owner tracing is on
pub struct RefCount {
    /// Resource description used in error messages
    name: &'static str,
    count: CachePadded<AtomicU32>,
    closed: AtomicBool,
    owners: Option<Mutex<Vec<OwnerId>>>,
}

impl RefCount {
    /// Create a counter holding one reservation for `initial_owner`.
    pub fn new(name: &'static str, initial_owner: OwnerId) -> Self {
        let owners = if config::owner_tracing() {
            Some(Mutex::new(vec![initial_owner]))
        } else {
            None
        };
        Self {
            name,
            count: CachePadded::new(AtomicU32::new(1)),
            closed: AtomicBool::new(false),
            owners,
        }
    }

    /// Add a reservation. Fails once closed or released.
    pub fn reserve(&self, owner: OwnerId) -> Result<()> {
        if self.is_closed() {
            return Err(BytesError::Closed(format!(
                "{} cannot be reserved by {}",
                self.name, owner
            )));
        }
        if !self.increment() {
            return Err(BytesError::Released(format!(
                "{} cannot be reserved by {}",
                self.name, owner
            )));
        }
        self.record(owner);
        Ok(())
    }

    /// Like `reserve` but reports failure as `false`.
    pub fn try_reserve(&self, owner: OwnerId) -> bool {
        if self.is_closed() || !self.increment() {
            return false;
        }
        self.record(owner);
        true
    }

    /// Drop one reservation held by `owner`.
    ///
    /// Releasing for an owner that holds nothing, or releasing past zero,
    /// is an error and leaves the count untouched.
    pub fn release(&self, owner: OwnerId) -> Result<ReleaseOutcome> {
        if let Some(owners) = &self.owners {
            let mut owners = owners.lock();
            match owners.iter().position(|o| *o == owner) {
                Some(idx) => {
                    owners.swap_remove(idx);
                }
                None if self.count() == 0 => {
                    return Err(self.released_error(owner));
                }
                None => return Err(BytesError::UnmatchedRelease { owner }),
            }
        }

        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return Err(self.released_error(owner));
            }
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) if current == 1 => return Ok(ReleaseOutcome::Freed),
                Ok(_) => return Ok(ReleaseOutcome::Retained(current - 1)),
                Err(actual) => current = actual,
            }
        }
    }

    /// Release the final reservation. Fails without releasing if others
    /// still hold the resource.
    pub fn release_last(&self, owner: OwnerId) -> Result<ReleaseOutcome> {
        let count = self.count();
        if count > 1 {
            return Err(BytesError::InvalidArgument(format!(
                "release_last of {} by {} but {} reservations remain",
                self.name, owner, count
            )));
        }
        self.release(owner)
    }

    /// Mark closed: no new reservations; existing holders may finish.
    /// Returns `true` for the call that actually closed it.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.count() == 0
    }

    /// Error unless at least one reservation is live.
    pub fn check_live(&self) -> Result<()> {
        if self.is_released() {
            return Err(BytesError::Released(self.name.to_string()));
        }
        Ok(())
    }

    /// Whether `owner` currently holds a reservation. Always `true` when
    /// owner tracing is disabled and the count is positive.
    pub fn reserved_by(&self, owner: OwnerId) -> bool {
        match &self.owners {
            Some(owners) => owners.lock().contains(&owner),
            None => !self.is_released(),
        }
    }

    /// Snapshot of the recorded owners (empty without owner tracing).
    pub fn owners(&self) -> Vec<OwnerId> {
        self.owners
            .as_ref()
            .map(|owners| owners.lock().clone())
            .unwrap_or_default()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// CAS increment that refuses to resurrect a zero count.
    fn increment(&self) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn record(&self, owner: OwnerId) {
        if let Some(owners) = &self.owners {
            owners.lock().push(owner);
        }
    }

    fn released_error(&self, owner: OwnerId) -> BytesError {
        BytesError::Released(format!("{} already released, release by {}", self.name, owner))
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCount")
            .field("name", &self.name)
            .field("count", &self.count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
