//! Configuration for atlasbytes
//!
//! Centralized configuration with sensible defaults, plus the two
//! process-wide switches (bounds checking and owner tracing).

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{BytesError, Result};

/// Default mapped chunk size (64 MB)
pub const DEFAULT_CHUNK_SIZE: u64 = 64 << 20;

/// Default overlap between consecutive chunks (one page)
pub const DEFAULT_OVERLAP_SIZE: u64 = 4 << 10;

/// Default logical capacity of a mapped file (1 TB, sparse)
pub const DEFAULT_MAPPED_CAPACITY: u64 = 1 << 40;

/// Largest capacity any store may report; offsets at or above this are
/// treated as negative values that wrapped.
pub const MAX_CAPACITY: u64 = i64::MAX as u64;

// =============================================================================
// Process-wide Switches
// =============================================================================

static BOUNDS_UNCHECKED: AtomicBool = AtomicBool::new(false);
static OWNER_TRACING: AtomicBool = AtomicBool::new(cfg!(debug_assertions));

/// Disable cursor bounds validation for every buffer in the process.
///
/// # Caution
/// With checks off, cursor operations no longer uphold
/// `start <= read_position <= write_position <= write_limit <= capacity`.
/// Region-level physical bounds are still enforced.
pub fn set_bounds_unchecked(unchecked: bool) {
    BOUNDS_UNCHECKED.store(unchecked, Ordering::Relaxed);
}

pub fn bounds_unchecked() -> bool {
    BOUNDS_UNCHECKED.load(Ordering::Relaxed)
}

/// Record reservation owners for leak and double-release diagnostics.
/// Defaults to on in debug builds. Affects counters created afterwards.
pub fn set_owner_tracing(enabled: bool) {
    OWNER_TRACING.store(enabled, Ordering::Relaxed);
}

pub fn owner_tracing() -> bool {
    OWNER_TRACING.load(Ordering::Relaxed)
}

// =============================================================================
// Config
// =============================================================================

/// Configuration for buffers and mapped files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Mapped File Configuration
    // -------------------------------------------------------------------------
    /// Bytes per mapped chunk. Chunk *i* starts at `i * chunk_size`.
    pub chunk_size: u64,

    /// Extra bytes mapped past each chunk so short accesses straddling a
    /// boundary need no remap.
    pub overlap_size: u64,

    /// Largest offset a mapped buffer may write to.
    pub mapped_capacity: u64,

    /// Map chunks read-only; writes fail with `ReadOnly`.
    pub read_only: bool,

    // -------------------------------------------------------------------------
    // Buffer Configuration
    // -------------------------------------------------------------------------
    /// Reads past the end return zero values instead of failing.
    pub lenient: bool,

    /// Skip cursor bounds checks (see `set_bounds_unchecked`).
    pub unchecked: bool,

    /// Warn when a buffer is mutated from a thread other than its creator.
    pub thread_safety_check: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap_size: DEFAULT_OVERLAP_SIZE,
            mapped_capacity: DEFAULT_MAPPED_CAPACITY,
            read_only: false,
            lenient: false,
            unchecked: false,
            thread_safety_check: cfg!(debug_assertions),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the mapped-file settings are usable.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(BytesError::Config("chunk_size must be positive".to_string()));
        }
        if self.chunk_size > MAX_CAPACITY || self.overlap_size > MAX_CAPACITY {
            return Err(BytesError::Config(format!(
                "chunk_size {} / overlap_size {} too large",
                self.chunk_size, self.overlap_size
            )));
        }
        if self.mapped_capacity < self.chunk_size || self.mapped_capacity > MAX_CAPACITY {
            return Err(BytesError::Config(format!(
                "mapped_capacity {} must be between chunk_size {} and {}",
                self.mapped_capacity, self.chunk_size, MAX_CAPACITY
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the mapped chunk size (in bytes)
    pub fn chunk_size(mut self, size: u64) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap mapped past each chunk (in bytes)
    pub fn overlap_size(mut self, size: u64) -> Self {
        self.config.overlap_size = size;
        self
    }

    /// Set the logical capacity of mapped files (in bytes)
    pub fn mapped_capacity(mut self, capacity: u64) -> Self {
        self.config.mapped_capacity = capacity;
        self
    }

    /// Open mapped files read-only
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Return zero values on reads past the end
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.config.lenient = lenient;
        self
    }

    /// Skip cursor bounds checks
    pub fn unchecked(mut self, unchecked: bool) -> Self {
        self.config.unchecked = unchecked;
        self
    }

    /// Warn on cross-thread mutation
    pub fn thread_safety_check(mut self, enabled: bool) -> Self {
        self.config.thread_safety_check = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
