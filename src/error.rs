//! Error types for atlasbytes
//!
//! Provides a unified error type for all buffer, store and mapping operations.
//! Bounds errors carry the offending offset, the limit it was checked against
//! and the capacity so a failure can be diagnosed from the message alone.

use thiserror::Error;

use crate::refcount::OwnerId;

/// Result type alias using BytesError
pub type Result<T> = std::result::Result<T, BytesError>;

/// Unified error type for atlasbytes operations
#[derive(Debug, Error)]
pub enum BytesError {
    // -------------------------------------------------------------------------
    // Bounds Errors
    // -------------------------------------------------------------------------
    /// A write would pass the current write limit or capacity.
    #[error("{op} overflow: offset {offset} + length {length} > limit {limit} (capacity {capacity})")]
    Overflow {
        op: &'static str,
        offset: u64,
        length: u64,
        limit: u64,
        capacity: u64,
    },

    /// A read would pass the current read limit, or start before the region.
    #[error("{op} underflow: offset {offset} + length {length} outside limit {limit} (capacity {capacity})")]
    Underflow {
        op: &'static str,
        offset: u64,
        length: u64,
        limit: u64,
        capacity: u64,
    },

    /// Negative offset/length or otherwise malformed parameter.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Resource already released: {0}")]
    Released(String),

    #[error("Resource closed: {0}")]
    Closed(String),

    #[error("Release by {owner} which holds no reservation")]
    UnmatchedRelease { owner: OwnerId },

    #[error("Read-only: {0}")]
    ReadOnly(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Decoding Errors
    // -------------------------------------------------------------------------
    #[error("Numeric format error: {0}")]
    NumericFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BytesError {
    /// True for `Underflow`, the only kind lenient mode absorbs.
    pub fn is_underflow(&self) -> bool {
        matches!(self, BytesError::Underflow { .. })
    }

    /// True for `Overflow`.
    pub fn is_overflow(&self) -> bool {
        matches!(self, BytesError::Overflow { .. })
    }
}

impl From<bincode::Error> for BytesError {
    fn from(e: bincode::Error) -> Self {
        BytesError::Serialization(e.to_string())
    }
}
