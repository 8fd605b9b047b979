//! Ownership Registry
//!
//! The reserve/release protocol shared by every storage region, mapped file
//! and buffer.
//!
//! ## Lifecycle
//! ```text
//!   new(owner) ──► count = 1
//!        │
//!        ├── reserve(other) ──► count + 1      (fails once closed/released)
//!        │
//!        ├── close()        ──► no new reservations, holders may finish
//!        │
//!        └── release(owner) ──► count - 1
//!                                  │
//!                                  └── 1 → 0: ReleaseOutcome::Freed
//!                                             (resource tears down once)
//! ```
//!
//! Owners are opaque `OwnerId` tokens, so a region never keeps its
//! reservation holders alive.

mod counter;
mod owner;

pub use counter::{RefCount, ReleaseOutcome};
pub use owner::OwnerId;

use crate::error::Result;

/// Anything whose lifetime is governed by a `RefCount`
pub trait ReferenceCounted {
    /// The counter backing this resource.
    fn refs(&self) -> &RefCount;

    /// Run teardown. Called exactly once, after the last release.
    fn perform_release(&self);

    /// Add a reservation for `owner`.
    fn reserve(&self, owner: OwnerId) -> Result<()> {
        self.refs().reserve(owner)
    }

    /// Add a reservation unless closed or released.
    fn try_reserve(&self, owner: OwnerId) -> bool {
        self.refs().try_reserve(owner)
    }

    /// Drop `owner`'s reservation, tearing down on the last one.
    fn release(&self, owner: OwnerId) -> Result<()> {
        if self.refs().release(owner)? == ReleaseOutcome::Freed {
            self.perform_release();
        }
        Ok(())
    }

    /// Drop the final reservation; errors if others remain.
    fn release_last(&self, owner: OwnerId) -> Result<()> {
        if self.refs().release_last(owner)? == ReleaseOutcome::Freed {
            self.perform_release();
        }
        Ok(())
    }

    fn ref_count(&self) -> u32 {
        self.refs().count()
    }

    fn is_released(&self) -> bool {
        self.refs().is_released()
    }

    fn reserved_by(&self, owner: OwnerId) -> bool {
        self.refs().reserved_by(owner)
    }
}
