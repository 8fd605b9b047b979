//! Owner identities
//!
//! An `OwnerId` names *who* holds a reservation. It is a plain integer token
//! with a static label for diagnostics, never a handle back to the owner, so
//! a region that records its owners cannot keep them alive.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of unique owner tokens. Zero is never handed out.
static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a reservation holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId {
    id: u64,
    label: &'static str,
}

impl OwnerId {
    /// Allocate a fresh owner identity with a diagnostic label.
    pub fn new(label: &'static str) -> Self {
        Self {
            id: NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed),
            label,
        }
    }

    /// Identity for a short-lived guard reservation (e.g. around rendering
    /// a debug string). Distinct from every other owner.
    pub fn temporary(label: &'static str) -> Self {
        Self::new(label)
    }

    /// The numeric token.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The diagnostic label.
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.label, self.id)
    }
}
