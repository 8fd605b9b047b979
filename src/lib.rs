//! # AtlasBytes
//!
//! Positional byte buffers over heap memory, native memory and chunk-mapped
//! files, with:
//! - Independent read and write cursors plus a write limit
//! - Elastic growth and transparent chunk switching for mapped files
//! - Reference-counted storage regions with owner tracing
//! - Stop-bit varints, length-prefixed strings and ASCII number text
//! - Atomic CAS and ordered access for shared memory
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Bytes<S: Backing>                        │
//! │   cursors · primitives · stop-bit · text · atomics · serde   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ region_for(offset, len)
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌──────────────┐          ┌──────────────┐
//!   │ ElasticStore │          │ ChunkedStore │
//!   │ heap/native  │          │  (mapped)    │
//!   └──────┬───────┘          └──────┬───────┘
//!          │                         │ acquire_chunk
//!          │                         ▼
//!          │                  ┌──────────────┐
//!          │                  │  MappedFile  │
//!          │                  │ segment table│
//!          │                  └──────┬───────┘
//!          ▼                         ▼
//!   ┌─────────────────────────────────────────┐
//!   │        Region (RefCount, OwnerId)       │
//!   └─────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod refcount;
pub mod store;
pub mod bytes;
pub mod mapped;
pub mod decimal;
pub mod pool;
pub mod reference;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BytesError, Result};
pub use config::Config;
pub use crate::bytes::{Bytes, BytesMarshallable, MemoryBytes};
pub use mapped::{MappedBytes, MappedFile};
pub use pool::BytesPool;
pub use reference::TextLongArray;
pub use refcount::{OwnerId, ReferenceCounted};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasBytes
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
