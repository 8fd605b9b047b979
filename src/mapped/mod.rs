//! Memory-mapped Buffers
//!
//! A `MappedBytes` is a `Bytes` over a file mapped in overlapping chunks.
//! Chunk switches are invisible to the caller: any offset below the mapped
//! capacity can be read or written.
//!
//! ## Architecture
//! ```text
//!   MappedBytes ──► ChunkedStore ──reserve──► MappedFile
//!                        │                        │
//!                        └──── current chunk ◄────┤ segment table
//!                                                 ├─ chunk 0  [0, C+O)
//!                                                 ├─ chunk 1  [C, 2C+O)
//!                                                 └─ ...
//! ```
//!
//! Several buffers may share one `MappedFile`; each holds at most one chunk.

mod chunked;
mod file;

pub use chunked::ChunkedStore;
pub use file::MappedFile;

use std::path::Path;
use std::sync::Arc;

use crate::bytes::Bytes;
use crate::config::Config;
use crate::error::Result;
use crate::store::Backing;

/// Buffer over a chunk-mapped file
pub type MappedBytes = Bytes<ChunkedStore>;

impl Bytes<ChunkedStore> {
    /// Open `path` as a single buffer that owns the file.
    ///
    /// Writable buffers start empty; call `set_read_limit` to expose data
    /// already in the file. Read-only buffers start with the whole file
    /// readable.
    pub fn open<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self> {
        let file = MappedFile::open(path, config)?;
        let bytes = Self::from_file(&file, config);
        // The buffer's own reservation keeps the file alive after this.
        file.close()?;
        bytes
    }

    /// A new buffer over an already open file.
    pub fn from_file(file: &Arc<MappedFile>, config: &Config) -> Result<Self> {
        let store = ChunkedStore::new(file)?;
        let mut bytes = Self::with_config(store, config);
        if file.is_read_only() {
            let len = file.len()?;
            bytes.set_read_limit(len)?;
        }
        Ok(bytes)
    }

    pub fn mapped_file(&self) -> &Arc<MappedFile> {
        self.store().file()
    }

    /// Number of chunk switches this buffer has made.
    pub fn chunk_transitions(&self) -> u64 {
        self.store().transitions()
    }

    /// Flush the current chunk up to the write cursor.
    pub fn sync(&mut self) -> Result<()> {
        let position = self.write_position();
        self.store_mut().sync_up_to(position)
    }
}
