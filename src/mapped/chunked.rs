//! Chunk Transition Automaton
//!
//! Drives a buffer's view of a `MappedFile` from chunk to chunk. The store
//! holds at most one chunk reservation at a time.
//!
//! ```text
//!   offset outside current chunk
//!        │
//!        ├─1─► acquire chunk(offset / chunk_size)   (reserve new)
//!        ├─2─► release previous chunk               (may unmap it)
//!        └─3─► current = new chunk
//! ```
//!
//! Reads and writes that span a chunk boundary are split: the part up to the
//! chunk's safe limit goes to the current chunk, unless the whole remainder
//! fits in the overlap, in which case it is done in one copy.

use std::sync::Arc;

use crate::error::{BytesError, Result};
use crate::refcount::{OwnerId, ReferenceCounted};
use crate::store::{Backing, Region};

use super::MappedFile;

/// Backing store over a chunked `MappedFile`
pub struct ChunkedStore {
    file: Arc<MappedFile>,
    current: Option<Arc<Region>>,
    owner: OwnerId,
    transitions: u64,
    released: bool,
}

impl ChunkedStore {
    /// Reserve `file` for a new store. No chunk is mapped until first use.
    pub fn new(file: &Arc<MappedFile>) -> Result<Self> {
        let owner = OwnerId::new("mapped bytes");
        file.reserve(owner)?;
        Ok(Self {
            file: Arc::clone(file),
            current: None,
            owner,
            transitions: 0,
            released: false,
        })
    }

    pub fn file(&self) -> &Arc<MappedFile> {
        &self.file
    }

    /// Number of times the current chunk has been switched.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    fn check_not_released(&self) -> Result<()> {
        if self.released {
            return Err(BytesError::Released(format!(
                "mapped bytes over {}",
                self.file.path().display()
            )));
        }
        Ok(())
    }

    /// Move to the chunk whose non-overlap part contains `offset`.
    fn transition(&mut self, offset: u64) -> Result<&Arc<Region>> {
        self.check_not_released()?;
        let next = self.file.acquire_chunk(self.owner, offset)?;
        let from = self.current.as_ref().map(|r| r.start());
        let to = next.start();

        let previous = self.current.replace(next);
        if let Some(previous) = previous {
            previous.release(self.owner)?;
        }
        self.transitions += 1;
        tracing::trace!(?from, to, offset, "chunk transition");

        self.current
            .as_ref()
            .ok_or_else(|| BytesError::Released("chunk".to_string()))
    }

    /// Current chunk if `offset` lies in its non-overlap part, else remap.
    fn chunk_at(&mut self, offset: u64) -> Result<Arc<Region>> {
        self.check_not_released()?;
        let hit = self.current.as_ref().filter(|r| r.inside(offset)).cloned();
        match hit {
            Some(region) => Ok(region),
            None => self.transition(offset).map(Arc::clone),
        }
    }

    /// Run `op` over `[offset, offset + len)` piece by piece, one chunk at
    /// a time. `op` receives the chunk, the absolute offset and the range
    /// within the caller's slice.
    fn for_each_piece<F>(&mut self, mut offset: u64, len: usize, mut op: F) -> Result<()>
    where
        F: FnMut(&Region, u64, std::ops::Range<usize>) -> Result<()>,
    {
        if let Some(region) = &self.current {
            if !self.released && region.inside_len(offset, len as u64) {
                return op(region, offset, 0..len);
            }
        }

        let overlap = self.file.overlap_size();
        let mut done = 0usize;
        while done < len {
            let region = self.chunk_at(offset)?;
            let remaining = (len - done) as u64;
            // a short last chunk of a read-only file can end before `offset`
            let safe = region.safe_limit().saturating_sub(offset);
            let copy = if safe + overlap >= remaining {
                remaining
            } else {
                safe
            };
            let copy = copy.min(region.limit().saturating_sub(offset));
            if copy == 0 {
                return Err(BytesError::Underflow {
                    op: "chunked access",
                    offset,
                    length: remaining,
                    limit: region.limit(),
                    capacity: self.file.capacity(),
                });
            }
            op(&region, offset, done..done + copy as usize)?;
            done += copy as usize;
            offset += copy;
        }
        Ok(())
    }
}

impl Backing for ChunkedStore {
    fn start(&self) -> u64 {
        0
    }

    fn capacity(&self) -> u64 {
        self.file.capacity()
    }

    /// Chunks are mapped on demand, so the whole capacity is addressable.
    fn real_capacity(&self) -> u64 {
        self.file.capacity()
    }

    fn is_elastic(&self) -> bool {
        true
    }

    fn is_direct_memory(&self) -> bool {
        true
    }

    fn is_shared(&self) -> bool {
        true
    }

    fn owner(&self) -> OwnerId {
        self.owner
    }

    fn current(&self) -> Option<&Arc<Region>> {
        self.current.as_ref()
    }

    fn region_for(&mut self, offset: u64, len: u64) -> Result<&Arc<Region>> {
        self.check_not_released()?;
        let covered = self
            .current
            .as_ref()
            .is_some_and(|r| r.inside_len(offset, len));
        if covered {
            return self
                .current
                .as_ref()
                .ok_or_else(|| BytesError::Released("chunk".to_string()));
        }
        let span = self.file.chunk_size() + self.file.overlap_size();
        let capacity = self.file.capacity();
        let region = self.transition(offset)?;
        if !region.inside_len(offset, len) {
            if region.limit() < region.start() + span && offset + len > region.limit() {
                return Err(BytesError::Underflow {
                    op: "chunk lookup",
                    offset,
                    length: len,
                    limit: region.limit(),
                    capacity,
                });
            }
            return Err(BytesError::InvalidArgument(format!(
                "range {}+{} spans more than one chunk plus overlap",
                offset, len
            )));
        }
        Ok(region)
    }

    fn ensure_capacity(&mut self, desired: u64) -> Result<()> {
        if desired > self.file.capacity() {
            return Err(BytesError::Overflow {
                op: "ensure capacity",
                offset: 0,
                length: desired,
                limit: self.file.capacity(),
                capacity: self.file.capacity(),
            });
        }
        Ok(())
    }

    fn read_at(&mut self, offset: u64, dst: &mut [u8]) -> Result<()> {
        let len = dst.len();
        self.for_each_piece(offset, len, |region, at, range| region.read(at, &mut dst[range]))
    }

    fn write_at(&mut self, offset: u64, src: &[u8]) -> Result<()> {
        if self.file.is_read_only() {
            return Err(BytesError::ReadOnly(format!(
                "write at {} to {}",
                offset,
                self.file.path().display()
            )));
        }
        self.for_each_piece(offset, src.len(), |region, at, range| region.write(at, &src[range]))
    }

    fn peek_at(&self, mut offset: u64, dst: &mut [u8]) -> Result<()> {
        self.check_not_released()?;
        let guard = OwnerId::temporary("peek");
        let mut done = 0usize;
        while done < dst.len() {
            let region = match &self.current {
                Some(r) if r.inside(offset) && r.try_reserve(guard) => Arc::clone(r),
                _ => self.file.acquire_chunk(guard, offset)?,
            };
            let remaining = (dst.len() - done) as u64;
            let copy = remaining.min(region.limit().saturating_sub(offset)) as usize;
            let result = if copy == 0 {
                Err(BytesError::Underflow {
                    op: "peek",
                    offset,
                    length: remaining,
                    limit: region.limit(),
                    capacity: self.file.capacity(),
                })
            } else {
                region.read(offset, &mut dst[done..done + copy])
            };
            region.release(guard)?;
            result?;
            done += copy;
            offset += copy as u64;
        }
        Ok(())
    }

    fn region_for_atomic(&mut self, offset: u64, size: u64) -> Result<&Arc<Region>> {
        self.check_not_released()?;
        let fits = |r: &Region| r.start() <= offset && offset + size <= r.safe_limit();
        if !self.current.as_ref().is_some_and(|r| fits(r.as_ref())) {
            self.transition(offset)?;
        }
        match &self.current {
            Some(region) if fits(region.as_ref()) => Ok(region),
            _ => Err(BytesError::InvalidArgument(format!(
                "atomic access of {} bytes at {} crosses a chunk boundary",
                size, offset
            ))),
        }
    }

    /// Remaps once `offset` reaches the overlap, so the returned address is
    /// good for reads up to the next chunk's safe limit.
    fn address_for_read(&mut self, offset: u64) -> Result<*const u8> {
        let region = self.chunk_at(offset)?;
        region.address_for_read(offset, 0)
    }

    fn address_for_read_len(&mut self, offset: u64, len: u64) -> Result<*const u8> {
        let region = self.region_for(offset, len)?;
        region.address_for_read(offset, len)
    }

    fn address_for_write(&mut self, offset: u64) -> Result<*mut u8> {
        let region = self.chunk_at(offset)?;
        region.address_for_write(offset, 0)
    }

    fn sync_up_to(&mut self, position: u64) -> Result<()> {
        match &self.current {
            Some(region) if !self.file.is_read_only() => region.sync_up_to(position),
            _ => Ok(()),
        }
    }

    fn release(&mut self) -> Result<()> {
        self.check_not_released()?;
        self.released = true;
        if let Some(region) = self.current.take() {
            region.release(self.owner)?;
        }
        self.file.release(self.owner)
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for ChunkedStore {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.release() {
            tracing::warn!(owner = %self.owner, error = %e, "failed to release mapped store on drop");
        }
    }
}

impl std::fmt::Debug for ChunkedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedStore")
            .field("path", &self.file.path())
            .field("current", &self.current.as_ref().map(|r| r.start()))
            .field("transitions", &self.transitions)
            .field("owner", &self.owner)
            .finish()
    }
}
