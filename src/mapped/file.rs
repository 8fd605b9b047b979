//! Mapped File Segment Table
//!
//! Maps a file as a sequence of fixed-size, overlapping chunks created on
//! first use. Chunk *i* covers `[i * chunk_size, i * chunk_size + chunk_size
//! + overlap_size)`; the overlap is an independent mapping of the same file
//! bytes that chunk *i + 1* starts with.
//!
//! ## Slot lifecycle
//! ```text
//!   None ──acquire──► Some(region, count ≥ 1) ──last release──► Some(released)
//!                           ▲                                         │
//!                           └──────────────── acquire (remap) ────────┘
//! ```
//!
//! The table never holds a reservation of its own: a chunk is unmapped as
//! soon as the last buffer using it moves on, and is mapped again lazily.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use memmap2::MmapOptions;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{BytesError, Result};
use crate::refcount::{OwnerId, RefCount, ReferenceCounted};
use crate::store::Region;

/// A file mapped chunk by chunk
pub struct MappedFile {
    path: PathBuf,
    file: File,
    chunk_size: u64,
    overlap_size: u64,
    capacity: u64,
    read_only: bool,
    /// Segment table, indexed by chunk number
    chunks: Mutex<Vec<Option<Arc<Region>>>>,
    /// Total mappings created over the file's life
    maps: AtomicU64,
    owner: OwnerId,
    refs: RefCount,
}

impl MappedFile {
    /// Open (creating when writable) the file at `path`.
    ///
    /// The returned handle holds one reservation under its own owner; it is
    /// given up by `close`.
    pub fn open<P: AsRef<Path>>(path: P, config: &Config) -> Result<Arc<Self>> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let file = if config.read_only {
            OpenOptions::new().read(true).open(&path)?
        } else {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?
        };

        let owner = OwnerId::new("mapped file");
        tracing::debug!(
            path = %path.display(),
            chunk_size = config.chunk_size,
            overlap_size = config.overlap_size,
            read_only = config.read_only,
            "opened mapped file"
        );

        Ok(Arc::new(Self {
            path,
            file,
            chunk_size: config.chunk_size,
            overlap_size: config.overlap_size,
            capacity: config.mapped_capacity,
            read_only: config.read_only,
            chunks: Mutex::new(Vec::new()),
            maps: AtomicU64::new(0),
            owner,
            refs: RefCount::new("mapped file", owner),
        }))
    }

    // =========================================================================
    // Chunk Acquisition
    // =========================================================================

    /// Return the chunk covering `offset`, reserved for `owner`.
    ///
    /// Concurrent callers asking for the same chunk converge on one mapping:
    /// lookup, map and register all happen under the table lock.
    pub fn acquire_chunk(&self, owner: OwnerId, offset: u64) -> Result<Arc<Region>> {
        // A closed file still serves buffers that reserved it earlier.
        self.refs.check_live()?;
        if offset >= self.capacity {
            return Err(BytesError::Overflow {
                op: "acquire chunk",
                offset,
                length: 0,
                limit: self.capacity,
                capacity: self.capacity,
            });
        }

        let index = (offset / self.chunk_size) as usize;
        let mut chunks = self.chunks.lock();
        if chunks.len() <= index {
            chunks.resize(index + 1, None);
        }

        if let Some(region) = &chunks[index] {
            if region.try_reserve(owner) {
                return Ok(Arc::clone(region));
            }
        }

        let region = Arc::new(self.map_chunk(index as u64, owner)?);
        chunks[index] = Some(Arc::clone(&region));
        Ok(region)
    }

    fn map_chunk(&self, index: u64, owner: OwnerId) -> Result<Region> {
        let start = index * self.chunk_size;
        let wanted = self.chunk_size + self.overlap_size;
        let file_len = self.file.metadata()?.len();

        let region = if self.read_only {
            if start >= file_len {
                return Err(BytesError::Underflow {
                    op: "map chunk",
                    offset: start,
                    length: wanted,
                    limit: file_len,
                    capacity: self.capacity,
                });
            }
            let len = wanted.min(file_len - start);
            // SAFETY: the file may be modified by another process while mapped;
            // all access goes through Region, which bounds-checks every offset
            // and never hands out references outliving the mapping.
            let mmap = unsafe {
                MmapOptions::new()
                    .offset(start)
                    .len(len as usize)
                    .map(&self.file)?
            };
            Region::mapped_read_only(start, self.chunk_size, mmap, owner)
        } else {
            let end = start + wanted;
            if file_len < end {
                self.file.set_len(end)?;
            }
            // SAFETY: as above; the file was just extended to cover the range.
            let mmap = unsafe {
                MmapOptions::new()
                    .offset(start)
                    .len(wanted as usize)
                    .map_mut(&self.file)?
            };
            Region::mapped(start, self.chunk_size, mmap, owner)
        };

        self.maps.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            path = %self.path.display(),
            chunk = index,
            start,
            len = region.real_capacity(),
            "mapped chunk"
        );
        Ok(region)
    }

    // =========================================================================
    // Durability
    // =========================================================================

    /// Flush every currently mapped chunk, then the file metadata.
    pub fn sync_all(&self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        let live: Vec<Arc<Region>> = self
            .chunks
            .lock()
            .iter()
            .flatten()
            .filter(|r| !r.is_released())
            .cloned()
            .collect();

        let guard = OwnerId::temporary("sync all");
        for region in live {
            if region.try_reserve(guard) {
                let result = region.sync_up_to(region.limit());
                region.release(guard)?;
                result?;
            }
        }
        self.file.sync_data()?;
        Ok(())
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn overlap_size(&self) -> u64 {
        self.overlap_size
    }

    /// Largest offset a buffer over this file may reach.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Current length of the file on disk.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of chunks needed to cover the file as it is on disk.
    pub fn chunk_count(&self) -> Result<u64> {
        Ok(self.len()?.div_ceil(self.chunk_size))
    }

    /// Number of chunks currently mapped.
    pub fn mapped_chunk_count(&self) -> usize {
        self.chunks
            .lock()
            .iter()
            .flatten()
            .filter(|r| !r.is_released())
            .count()
    }

    /// Number of mappings created so far, remaps included.
    pub fn map_count(&self) -> u64 {
        self.maps.load(Ordering::Relaxed)
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Refuse new buffers and give up the handle's own reservation.
    /// Buffers already open keep working until released.
    pub fn close(&self) -> Result<()> {
        if self.refs.close() {
            self.release(self.owner)?;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.refs.is_closed()
    }
}

impl ReferenceCounted for MappedFile {
    fn refs(&self) -> &RefCount {
        &self.refs
    }

    fn perform_release(&self) {
        let slots = std::mem::take(&mut *self.chunks.lock());
        let leaked = slots.iter().flatten().filter(|r| !r.is_released()).count();
        if leaked > 0 {
            tracing::warn!(path = %self.path.display(), leaked, "mapped file released with chunks still reserved");
        }
        tracing::debug!(path = %self.path.display(), maps = self.map_count(), "mapped file released");
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("path", &self.path)
            .field("chunk_size", &self.chunk_size)
            .field("overlap_size", &self.overlap_size)
            .field("read_only", &self.read_only)
            .field("refs", &self.refs)
            .finish()
    }
}
