//! Storage Region
//!
//! One contiguous addressable span: a heap array, a native allocation or a
//! single mapped file chunk. Offsets are absolute: a mapped chunk starting at
//! file offset `start` is addressed with file offsets, not chunk-relative ones.
//!
//! ## Layout of a mapped chunk
//! ```text
//!   start                      safe_limit          start + real_capacity
//!     │◄──────── chunk_size ───────►│◄── overlap ──►│
//!     ├─────────────────────────────┼───────────────┤
//!     │       owned by chunk i      │ same bytes as │
//!     │                             │ chunk i+1     │
//!     └─────────────────────────────┴───────────────┘
//! ```
//!
//! The memory is freed (or unmapped) exactly once, when the reservation count
//! drops from one to zero. Every accessor first checks the count is live; a
//! caller must itself hold a reservation for the duration of an access.

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr;
use std::sync::atomic::{fence, AtomicI32, AtomicI64, Ordering};

use memmap2::{Mmap, MmapMut};
use parking_lot::Mutex;

use crate::error::{BytesError, Result};
use crate::refcount::{OwnerId, RefCount, ReferenceCounted};

/// Alignment of native allocations (one cache line)
const NATIVE_ALIGN: usize = 64;

/// What kind of memory backs a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Boxed word array on the Rust heap, 8-byte aligned
    Heap,
    /// Raw block from the global allocator, cache-line aligned
    Native,
    /// One chunk of a memory-mapped file
    Mapped,
}

/// Owner of the actual memory; replaced by `Freed` on teardown
enum Memory {
    Heap { ptr: *mut u64, words: usize },
    Native { ptr: *mut u8, layout: Option<Layout> },
    MappedRw(MmapMut),
    MappedRo(Mmap),
    Freed,
}

impl Memory {
    fn free(self) {
        match self {
            Memory::Heap { ptr, words } => {
                // SAFETY: `ptr`/`words` came from `Box::into_raw` on a boxed
                // slice of exactly `words` u64s and are freed only here.
                unsafe { drop(Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, words))) }
            }
            Memory::Native { ptr, layout: Some(layout) } => {
                // SAFETY: allocated with this layout in `Region::native`.
                unsafe { alloc::dealloc(ptr, layout) }
            }
            Memory::Native { layout: None, .. } => {}
            Memory::MappedRw(mmap) => drop(mmap),
            Memory::MappedRo(mmap) => drop(mmap),
            Memory::Freed => {}
        }
    }
}

/// A contiguous, reference-counted span of bytes
pub struct Region {
    kind: RegionKind,
    /// First valid offset
    start: u64,
    /// Logical capacity (chunk size for mapped chunks)
    capacity: u64,
    /// Bytes physically addressable from `start` (chunk + overlap)
    real_capacity: u64,
    /// End of the range owned exclusively by this region
    safe_limit: u64,
    writable: bool,
    /// Base address corresponding to `start`
    base: *mut u8,
    memory: Mutex<Memory>,
    refs: RefCount,
}

// SAFETY: the raw base pointer is only dereferenced while a reservation is
// held, and all mutation goes through raw copies or atomics; the memory
// owner itself sits behind a mutex.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Zeroed heap region of `capacity` bytes, reserved by `owner`. Word
    /// backed so 8-byte atomics work at aligned offsets.
    pub fn heap(capacity: u64, owner: OwnerId) -> Result<Self> {
        let words = to_usize(capacity)?.div_ceil(8);
        let boxed = vec![0u64; words].into_boxed_slice();
        let words_ptr = Box::into_raw(boxed) as *mut u64;
        let ptr = words_ptr as *mut u8;
        Ok(Self::from_parts(
            RegionKind::Heap,
            0,
            capacity,
            capacity,
            capacity,
            true,
            ptr,
            Memory::Heap { ptr: words_ptr, words },
            owner,
        ))
    }

    /// Heap region holding a copy of `data`.
    pub fn heap_from(data: &[u8], owner: OwnerId) -> Result<Self> {
        let region = Self::heap(data.len() as u64, owner)?;
        region.write(0, data)?;
        Ok(region)
    }

    /// Zeroed, cache-line aligned native region.
    pub fn native(capacity: u64, owner: OwnerId) -> Result<Self> {
        let len = to_usize(capacity)?;
        let (ptr, layout) = if len == 0 {
            (ptr::NonNull::<u8>::dangling().as_ptr(), None)
        } else {
            let layout = Layout::from_size_align(len, NATIVE_ALIGN)
                .map_err(|e| BytesError::InvalidArgument(format!("native layout: {}", e)))?;
            // SAFETY: layout has non-zero size.
            let ptr = unsafe { alloc::alloc_zeroed(layout) };
            if ptr.is_null() {
                return Err(BytesError::Io(std::io::Error::new(
                    std::io::ErrorKind::OutOfMemory,
                    format!("failed to allocate {} native bytes", len),
                )));
            }
            (ptr, Some(layout))
        };
        Ok(Self::from_parts(
            RegionKind::Native,
            0,
            capacity,
            capacity,
            capacity,
            true,
            ptr,
            Memory::Native { ptr, layout },
            owner,
        ))
    }

    /// Region over a writable mapping of `[start, start + mmap.len())`.
    pub fn mapped(start: u64, chunk_size: u64, mut mmap: MmapMut, owner: OwnerId) -> Self {
        let real_capacity = mmap.len() as u64;
        let base = mmap.as_mut_ptr();
        Self::from_parts(
            RegionKind::Mapped,
            start,
            chunk_size,
            real_capacity,
            start + chunk_size.min(real_capacity),
            true,
            base,
            Memory::MappedRw(mmap),
            owner,
        )
    }

    /// Region over a read-only mapping.
    pub fn mapped_read_only(start: u64, chunk_size: u64, mmap: Mmap, owner: OwnerId) -> Self {
        let real_capacity = mmap.len() as u64;
        let base = mmap.as_ptr() as *mut u8;
        Self::from_parts(
            RegionKind::Mapped,
            start,
            chunk_size,
            real_capacity,
            start + chunk_size.min(real_capacity),
            false,
            base,
            Memory::MappedRo(mmap),
            owner,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn from_parts(
        kind: RegionKind,
        start: u64,
        capacity: u64,
        real_capacity: u64,
        safe_limit: u64,
        writable: bool,
        base: *mut u8,
        memory: Memory,
        owner: OwnerId,
    ) -> Self {
        let name = match kind {
            RegionKind::Heap => "heap region",
            RegionKind::Native => "native region",
            RegionKind::Mapped => "mapped chunk",
        };
        Self {
            kind,
            start,
            capacity,
            real_capacity,
            safe_limit,
            writable,
            base,
            memory: Mutex::new(memory),
            refs: RefCount::new(name, owner),
        }
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn real_capacity(&self) -> u64 {
        self.real_capacity
    }

    /// One past the last offset physically addressable.
    pub fn limit(&self) -> u64 {
        self.start + self.real_capacity
    }

    pub fn safe_limit(&self) -> u64 {
        self.safe_limit
    }

    pub fn is_direct_memory(&self) -> bool {
        self.kind != RegionKind::Heap
    }

    /// Mapped regions may be shared across buffers and threads.
    pub fn is_shared(&self) -> bool {
        self.kind == RegionKind::Mapped
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// `start <= offset < safe_limit`: the offset lies in the non-overlap
    /// part of this region.
    pub fn inside(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.safe_limit
    }

    /// `[offset, offset + len)` lies within the region including overlap.
    pub fn inside_len(&self, offset: u64, len: u64) -> bool {
        self.start <= offset
            && offset
                .checked_add(len)
                .map_or(false, |end| end <= self.limit())
    }

    // =========================================================================
    // Raw Access
    // =========================================================================

    /// Copy `dst.len()` bytes starting at `offset` into `dst`.
    pub fn read(&self, offset: u64, dst: &mut [u8]) -> Result<()> {
        let src = self.translate("region read", offset, dst.len() as u64, false)?;
        // SAFETY: translate checked the range is inside the live mapping;
        // `dst` is a distinct Rust allocation.
        unsafe { ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), dst.len()) };
        Ok(())
    }

    /// Copy `src` into the region starting at `offset`.
    pub fn write(&self, offset: u64, src: &[u8]) -> Result<()> {
        let dst = self.translate("region write", offset, src.len() as u64, true)?;
        // SAFETY: as in `read`; `src` cannot alias region memory mutably.
        unsafe { ptr::copy(src.as_ptr(), dst, src.len()) };
        Ok(())
    }

    /// Set `len` bytes at `offset` to `value`.
    pub fn fill(&self, offset: u64, len: u64, value: u8) -> Result<()> {
        let dst = self.translate("region fill", offset, len, true)?;
        // SAFETY: range checked by translate.
        unsafe { ptr::write_bytes(dst, value, len as usize) };
        Ok(())
    }

    /// memmove within the region: overlapping ranges copy in the direction
    /// that leaves unread source bytes intact.
    pub fn move_bytes(&self, from: u64, to: u64, len: u64) -> Result<()> {
        let src = self.translate("region move", from, len, false)?;
        let dst = self.translate("region move", to, len, true)?;
        // SAFETY: both ranges checked; `ptr::copy` handles overlap.
        unsafe { ptr::copy(src, dst, len as usize) };
        Ok(())
    }

    /// Copy the first `len` bytes of this region into `other` at its start.
    pub fn copy_to(&self, other: &Region, len: u64) -> Result<()> {
        let src = self.translate("region copy", self.start, len, false)?;
        let dst = other.translate("region copy", other.start, len, true)?;
        // SAFETY: distinct regions, both ranges checked.
        unsafe { ptr::copy_nonoverlapping(src, dst, len as usize) };
        Ok(())
    }

    /// Address of `offset` for a read of at most `len` bytes.
    pub fn address_for_read(&self, offset: u64, len: u64) -> Result<*const u8> {
        Ok(self.translate("address for read", offset, len, false)? as *const u8)
    }

    /// Address of `offset` for a write of at most `len` bytes.
    pub fn address_for_write(&self, offset: u64, len: u64) -> Result<*mut u8> {
        self.translate("address for write", offset, len, true)
    }

    // =========================================================================
    // Atomic Access
    // =========================================================================

    pub fn compare_and_swap_i32(&self, offset: u64, expected: i32, value: i32) -> Result<bool> {
        let addr = self.atomic_address(offset, 4)?;
        // SAFETY: address checked in-range, 4-byte aligned and live.
        let atomic = unsafe { &*(addr as *const AtomicI32) };
        Ok(atomic
            .compare_exchange(expected, value, Ordering::AcqRel, Ordering::Acquire)
            .is_ok())
    }

    pub fn compare_and_swap_i64(&self, offset: u64, expected: i64, value: i64) -> Result<bool> {
        let addr = self.atomic_address(offset, 8)?;
        // SAFETY: address checked in-range, 8-byte aligned and live.
        let atomic = unsafe { &*(addr as *const AtomicI64) };
        Ok(atomic
            .compare_exchange(expected, value, Ordering::AcqRel, Ordering::Acquire)
            .is_ok())
    }

    /// Read with acquire semantics; the offset need not be aligned.
    pub fn read_volatile(&self, offset: u64, dst: &mut [u8]) -> Result<()> {
        self.read(offset, dst)?;
        fence(Ordering::Acquire);
        Ok(())
    }

    /// Write with release semantics; the offset need not be aligned.
    pub fn write_ordered(&self, offset: u64, src: &[u8]) -> Result<()> {
        fence(Ordering::Release);
        self.write(offset, src)
    }

    // =========================================================================
    // Durability
    // =========================================================================

    /// Flush modified bytes in `[start, end)` of a writable mapping.
    /// A no-op for heap and native regions.
    pub fn sync_up_to(&self, end: u64) -> Result<()> {
        self.refs.check_live()?;
        let memory = self.memory.lock();
        if let Memory::MappedRw(mmap) = &*memory {
            let len = end.saturating_sub(self.start).min(self.real_capacity) as usize;
            if len > 0 {
                mmap.flush_range(0, len)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn translate(&self, op: &'static str, offset: u64, len: u64, write: bool) -> Result<*mut u8> {
        self.refs.check_live()?;
        if write && !self.writable {
            return Err(BytesError::ReadOnly(format!("{} at offset {}", op, offset)));
        }
        let in_range = offset >= self.start
            && offset
                .checked_add(len)
                .map_or(false, |end| end <= self.limit());
        if !in_range {
            return Err(if write {
                BytesError::Overflow {
                    op,
                    offset,
                    length: len,
                    limit: self.limit(),
                    capacity: self.capacity,
                }
            } else {
                BytesError::Underflow {
                    op,
                    offset,
                    length: len,
                    limit: self.limit(),
                    capacity: self.capacity,
                }
            });
        }
        // SAFETY: offset - start < real_capacity, within the allocation.
        Ok(unsafe { self.base.add((offset - self.start) as usize) })
    }

    fn atomic_address(&self, offset: u64, size: u64) -> Result<*mut u8> {
        let addr = self.translate("atomic access", offset, size, true)?;
        if (addr as usize) % size as usize != 0 {
            return Err(BytesError::InvalidArgument(format!(
                "offset {} is not {}-byte aligned for an atomic access",
                offset, size
            )));
        }
        Ok(addr)
    }
}

impl ReferenceCounted for Region {
    fn refs(&self) -> &RefCount {
        &self.refs
    }

    fn perform_release(&self) {
        let memory = std::mem::replace(&mut *self.memory.lock(), Memory::Freed);
        tracing::debug!(
            kind = ?self.kind,
            start = self.start,
            real_capacity = self.real_capacity,
            "region released"
        );
        memory.free();
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        let memory = std::mem::replace(self.memory.get_mut(), Memory::Freed);
        if !matches!(memory, Memory::Freed) {
            let owners = self.refs.owners();
            tracing::warn!(
                kind = ?self.kind,
                start = self.start,
                count = self.refs.count(),
                ?owners,
                "region dropped while still reserved"
            );
            memory.free();
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("kind", &self.kind)
            .field("start", &self.start)
            .field("capacity", &self.capacity)
            .field("real_capacity", &self.real_capacity)
            .field("refs", &self.refs)
            .finish()
    }
}

fn to_usize(capacity: u64) -> Result<usize> {
    usize::try_from(capacity)
        .map_err(|_| BytesError::InvalidArgument(format!("capacity {} exceeds address space", capacity)))
}
