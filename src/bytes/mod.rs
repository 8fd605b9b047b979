//! Positional Buffer
//!
//! `Bytes<S>` is a cursor-bearing view over a backing store `S`.
//!
//! ## Cursor layout
//! ```text
//!   start      read_position     write_position    write_limit     capacity
//!     │  consumed  │    readable    │    writable     │   reserved    │
//!     ├────────────┼────────────────┼─────────────────┼───────────────┤
//!                                   └─ read_limit
//! ```
//!
//! After every mutating call (unless bounds checks are off):
//! `start <= read_position <= write_position <= write_limit <= capacity`.
//!
//! Sequential reads are checked against `read_limit`, writes against
//! `write_limit`. Absolute accessors (`*_at`) check against `write_limit` and
//! leave the cursors alone. An elastic store grows when a write passes its
//! real capacity; a mapped store switches chunks.
//!
//! Offsets are `u64`; values at or above 2^63 are negative offsets that
//! wrapped and are always rejected with `InvalidArgument`.
//!
//! A buffer is not thread-safe. With `thread_safety_check` on, use from a
//! second thread is logged once; `reset_thread_owner` hands it over.

mod atomic;
mod marshal;
mod primitives;
mod stopbit;
mod text;

pub use marshal::BytesMarshallable;

use std::fmt;
use std::thread::{self, ThreadId};

use crate::config::{self, Config, MAX_CAPACITY};
use crate::decimal::{self, Decimaliser};
use crate::error::{BytesError, Result};
use crate::refcount::ReferenceCounted;
use crate::store::{Backing, ElasticStore};

/// Buffer over heap or native memory
pub type MemoryBytes = Bytes<ElasticStore>;

/// Longest readable prefix rendered by `Display`
const DISPLAY_LIMIT: usize = 1024;

/// Chunk size used when scanning ranges for checksums
const SCAN_CHUNK: usize = 4096;

/// Records which thread may mutate a buffer
#[derive(Debug)]
struct ThreadGuard {
    owner: ThreadId,
    warned: bool,
}

/// Positional read/write buffer over a backing store
pub struct Bytes<S: Backing> {
    store: S,
    read_position: u64,
    write_position: u64,
    write_limit: u64,
    lenient: bool,
    unchecked: bool,
    closed: bool,
    decimaliser: &'static dyn Decimaliser,
    last_decimal_places: i32,
    last_number_had_digits: bool,
    thread_guard: Option<ThreadGuard>,
}

// =============================================================================
// Construction
// =============================================================================

impl<S: Backing> Bytes<S> {
    /// Wrap `store` with default flags; the buffer starts empty with the
    /// write limit at capacity.
    pub fn with_store(store: S) -> Self {
        Self::with_config(store, &Config::default())
    }

    /// Wrap `store` taking `lenient`, `unchecked` and `thread_safety_check`
    /// from `config`.
    pub fn with_config(store: S, config: &Config) -> Self {
        let start = store.start();
        let capacity = store.capacity();
        let thread_guard = config.thread_safety_check.then(|| ThreadGuard {
            owner: thread::current().id(),
            warned: false,
        });
        Self {
            store,
            read_position: start,
            write_position: start,
            write_limit: capacity,
            lenient: config.lenient,
            unchecked: config.unchecked,
            closed: false,
            decimaliser: &decimal::STANDARD,
            last_decimal_places: 0,
            last_number_had_digits: false,
            thread_guard,
        }
    }
}

impl Bytes<ElasticStore> {
    /// Elastic buffer on the heap, initially backed by `initial` bytes.
    pub fn elastic_heap(initial: u64) -> Result<Self> {
        Ok(Self::with_store(ElasticStore::elastic_heap(initial)?))
    }

    /// Elastic buffer in native memory.
    pub fn elastic_native(initial: u64) -> Result<Self> {
        Ok(Self::with_store(ElasticStore::elastic_native(initial)?))
    }

    /// Fixed-capacity heap buffer.
    pub fn fixed_heap(capacity: u64) -> Result<Self> {
        Ok(Self::with_store(ElasticStore::fixed_heap(capacity)?))
    }

    /// Fixed-capacity native buffer.
    pub fn fixed_native(capacity: u64) -> Result<Self> {
        Ok(Self::with_store(ElasticStore::fixed_native(capacity)?))
    }

    /// Fixed heap buffer holding a copy of `data`, all of it readable.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let mut bytes = Self::with_store(ElasticStore::from_slice(data)?);
        bytes.write_position = data.len() as u64;
        Ok(bytes)
    }
}

// =============================================================================
// Attributes
// =============================================================================

impl<S: Backing> Bytes<S> {
    pub fn start(&self) -> u64 {
        self.store.start()
    }

    pub fn capacity(&self) -> u64 {
        self.store.capacity()
    }

    /// Bytes currently backed by memory.
    pub fn real_capacity(&self) -> u64 {
        self.store.real_capacity()
    }

    pub fn read_position(&self) -> u64 {
        self.read_position
    }

    pub fn write_position(&self) -> u64 {
        self.write_position
    }

    /// Always equal to `write_position`.
    pub fn read_limit(&self) -> u64 {
        self.write_position
    }

    pub fn write_limit(&self) -> u64 {
        self.write_limit
    }

    pub fn read_remaining(&self) -> u64 {
        self.write_position.saturating_sub(self.read_position)
    }

    pub fn write_remaining(&self) -> u64 {
        self.write_limit.saturating_sub(self.write_position)
    }

    pub fn is_empty(&self) -> bool {
        self.read_remaining() == 0
    }

    pub fn is_elastic(&self) -> bool {
        self.store.is_elastic()
    }

    pub fn is_direct_memory(&self) -> bool {
        self.store.is_direct_memory()
    }

    pub fn is_shared(&self) -> bool {
        self.store.is_shared()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn lenient(&self) -> bool {
        self.lenient
    }

    /// Reads past the end return zero values instead of `Underflow`.
    pub fn set_lenient(&mut self, lenient: bool) {
        self.lenient = lenient;
    }

    pub fn is_unchecked(&self) -> bool {
        self.unchecked
    }

    /// Skip cursor bounds checks on this buffer.
    ///
    /// # Caution
    /// The cursor invariant is no longer upheld. Accesses are still confined
    /// to the backing memory.
    pub fn set_unchecked(&mut self, unchecked: bool) {
        self.unchecked = unchecked;
    }

    /// Strategy used by `append_f64` / `append_f32`.
    pub fn set_decimaliser(&mut self, decimaliser: &'static dyn Decimaliser) {
        self.decimaliser = decimaliser;
    }

    /// Decimal places written or parsed by the last numeric text operation.
    pub fn last_decimal_places(&self) -> i32 {
        self.last_decimal_places
    }

    /// Whether the last numeric text operation saw any digits.
    pub fn last_number_had_digits(&self) -> bool {
        self.last_number_had_digits
    }

    /// Bind the thread check to the calling thread.
    pub fn reset_thread_owner(&mut self) {
        if let Some(guard) = &mut self.thread_guard {
            guard.owner = thread::current().id();
            guard.warned = false;
        }
    }
}

// =============================================================================
// Cursor Management
// =============================================================================

impl<S: Backing> Bytes<S> {
    pub fn set_read_position(&mut self, position: u64) -> Result<()> {
        self.prepare()?;
        check_offset(position)?;
        if self.checks_enabled() && (position < self.start() || position > self.read_limit()) {
            return Err(self.underflow("set read position", position, 0, self.read_limit()));
        }
        self.read_position = position;
        Ok(())
    }

    /// Move the write cursor; a read cursor past it is pulled back.
    pub fn set_write_position(&mut self, position: u64) -> Result<()> {
        self.prepare()?;
        check_offset(position)?;
        if self.checks_enabled() && (position < self.start() || position > self.write_limit) {
            return Err(self.overflow("set write position", position, 0, self.write_limit));
        }
        if position > self.store.real_capacity() {
            self.store.ensure_capacity(position)?;
        }
        self.read_position = self.read_position.min(position);
        self.write_position = position;
        Ok(())
    }

    /// Set `read_limit` (that is, `write_position`).
    pub fn set_read_limit(&mut self, limit: u64) -> Result<()> {
        self.prepare()?;
        check_offset(limit)?;
        if self.checks_enabled() && (limit < self.start() || limit > self.write_limit) {
            return Err(self.underflow("set read limit", limit, 0, self.write_limit));
        }
        self.read_position = self.read_position.min(limit);
        self.write_position = limit;
        Ok(())
    }

    /// Set `write_limit`; it may not drop below `write_position`.
    pub fn set_write_limit(&mut self, limit: u64) -> Result<()> {
        self.prepare()?;
        check_offset(limit)?;
        if self.checks_enabled() {
            let capacity = self.capacity();
            if limit < self.write_position || limit > capacity {
                return Err(self.overflow("set write limit", limit, 0, capacity));
            }
        }
        self.write_limit = limit;
        Ok(())
    }

    /// Set `read_limit = position + remaining`, then `read_position = position`.
    pub fn read_position_remaining(&mut self, position: u64, remaining: u64) -> Result<()> {
        let limit = position
            .checked_add(remaining)
            .ok_or_else(|| BytesError::InvalidArgument(format!("{} + {}", position, remaining)))?;
        self.set_read_limit(limit)?;
        self.set_read_position(position)
    }

    /// Advance (or, with a negative count, rewind) the read cursor. Lenient
    /// buffers clamp the skip to what is readable.
    pub fn read_skip(&mut self, count: i64) -> Result<()> {
        self.prepare()?;
        let count = if self.lenient {
            count.min(self.read_remaining() as i64)
        } else {
            count
        };
        let target = shift(self.read_position, count)?;
        if self.checks_enabled() && (target < self.start() || target > self.read_limit()) {
            return Err(self.underflow("read skip", self.read_position, count.unsigned_abs(), self.read_limit()));
        }
        self.read_position = target;
        Ok(())
    }

    /// Advance the write cursor, or rewind it as far as `start`.
    pub fn write_skip(&mut self, count: i64) -> Result<()> {
        self.prepare()?;
        let target = shift(self.write_position, count)?;
        if self.checks_enabled() && (target < self.start() || target > self.write_limit) {
            return Err(self.overflow("write skip", self.write_position, count.unsigned_abs(), self.write_limit));
        }
        if target > self.store.real_capacity() {
            self.store.ensure_capacity(target)?;
        }
        self.read_position = self.read_position.min(target);
        self.write_position = target;
        Ok(())
    }

    /// Reset both cursors to `start` and the write limit to capacity.
    pub fn clear(&mut self) -> Result<()> {
        self.prepare()?;
        let start = self.start();
        self.read_position = start;
        self.write_position = start;
        self.write_limit = self.capacity();
        Ok(())
    }

    /// Like `clear`, but both cursors land at `start + padding`.
    pub fn clear_and_pad(&mut self, padding: u64) -> Result<()> {
        self.prepare()?;
        check_offset(padding)?;
        let start = self.start();
        let capacity = self.capacity();
        let target = start + padding;
        if target > capacity {
            return Err(self.overflow("clear and pad", start, padding, capacity));
        }
        if target > self.store.real_capacity() {
            self.store.ensure_capacity(target)?;
        }
        self.read_position = target;
        self.write_position = target;
        self.write_limit = capacity;
        Ok(())
    }

    /// Shift the unread bytes down to `start`.
    pub fn compact(&mut self) -> Result<()> {
        self.prepare()?;
        let start = self.start();
        let remaining = self.read_remaining();
        if remaining > 0 && start < self.read_position {
            self.store.move_bytes(self.read_position, start, remaining)?;
            self.read_position = start;
            self.write_position = start + remaining;
        }
        Ok(())
    }

    /// Copy `length` bytes from `from` to `to` with memmove semantics.
    /// Cursors are not changed.
    pub fn move_bytes(&mut self, from: u64, to: u64, length: u64) -> Result<()> {
        self.prepare()?;
        check_offset(from)?;
        check_offset(to)?;
        check_offset(length)?;
        if length == 0 {
            return Ok(());
        }
        self.read_check("move", from, length, true)?;
        self.write_check("move", to, length)?;
        self.store.move_bytes(from, to, length)
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

impl<S: Backing> Bytes<S> {
    /// Give up the reservation on the backing memory. Every later access,
    /// including a second release, fails with `Released`.
    pub fn release(&mut self) -> Result<()> {
        self.store.release()
    }

    pub fn is_released(&self) -> bool {
        self.store.is_released()
    }

    /// Refuse further operations and release.
    pub fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.release()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Reservation count of the region currently in use, if any.
    pub fn ref_count(&self) -> u32 {
        self.store.current().map_or(0, |r| r.ref_count())
    }
}

// =============================================================================
// Inspection
// =============================================================================

impl<S: Backing> Bytes<S> {
    /// Copy of the readable bytes, taken without moving any cursor.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.read_remaining() as usize];
        if !out.is_empty() {
            self.store.peek_at(self.read_position, &mut out)?;
        }
        Ok(out)
    }

    /// Wrapping sum of the bytes in `[start, end)`.
    pub fn byte_check_sum(&mut self, start: u64, end: u64) -> Result<u8> {
        let mut sum = 0u8;
        self.scan(start, end, |chunk| {
            sum = chunk.iter().fold(sum, |acc, &b| acc.wrapping_add(b));
        })?;
        Ok(sum)
    }

    /// CRC-32 of the bytes in `[start, end)`.
    pub fn crc32(&mut self, start: u64, end: u64) -> Result<u32> {
        let mut hasher = crc32fast::Hasher::new();
        self.scan(start, end, |chunk| hasher.update(chunk))?;
        Ok(hasher.finalize())
    }

    fn scan(&mut self, start: u64, end: u64, mut visit: impl FnMut(&[u8])) -> Result<()> {
        check_offset(start)?;
        check_offset(end)?;
        if end < start {
            return Err(BytesError::InvalidArgument(format!("end {} < start {}", end, start)));
        }
        self.read_check("scan", start, end - start, false)?;
        let mut buf = [0u8; SCAN_CHUNK];
        let mut offset = start;
        while offset < end {
            let n = ((end - offset) as usize).min(SCAN_CHUNK);
            self.store.read_at(offset, &mut buf[..n])?;
            visit(&buf[..n]);
            offset += n as u64;
        }
        Ok(())
    }
}

// =============================================================================
// Checks (shared by the accessor modules)
// =============================================================================

impl<S: Backing> Bytes<S> {
    fn checks_enabled(&self) -> bool {
        !self.unchecked && !config::bounds_unchecked()
    }

    /// Run before every operation: closed check and the thread check.
    fn prepare(&mut self) -> Result<()> {
        if self.closed {
            return Err(BytesError::Closed("bytes".to_string()));
        }
        if let Some(guard) = &mut self.thread_guard {
            let current = thread::current().id();
            if guard.owner != current && !guard.warned {
                guard.warned = true;
                tracing::warn!(
                    owner = ?guard.owner,
                    current = ?current,
                    "buffer used from a thread other than the one that owns it"
                );
            }
        }
        Ok(())
    }

    /// `[offset, offset + len)` must lie in `[start, limit)` where the limit
    /// is `write_limit` for absolute (`given`) reads and `read_limit`
    /// otherwise.
    fn read_check(&self, op: &'static str, offset: u64, len: u64, given: bool) -> Result<()> {
        check_offset(offset)?;
        if !self.checks_enabled() {
            return Ok(());
        }
        let limit = if given { self.write_limit } else { self.read_limit() };
        if offset < self.start() || offset.saturating_add(len) > limit {
            return Err(self.underflow(op, offset, len, limit));
        }
        Ok(())
    }

    /// `[offset, offset + len)` must lie in `[start, write_limit)`; grows
    /// the store if needed.
    fn write_check(&mut self, op: &'static str, offset: u64, len: u64) -> Result<()> {
        check_offset(offset)?;
        let end = offset.saturating_add(len);
        if self.checks_enabled() && (offset < self.start() || end > self.write_limit) {
            return Err(self.overflow(op, offset, len, self.write_limit));
        }
        if end > self.store.real_capacity() {
            self.store.ensure_capacity(end)?;
        }
        Ok(())
    }

    fn overflow(&self, op: &'static str, offset: u64, length: u64, limit: u64) -> BytesError {
        BytesError::Overflow {
            op,
            offset,
            length,
            limit,
            capacity: self.capacity(),
        }
    }

    fn underflow(&self, op: &'static str, offset: u64, length: u64, limit: u64) -> BytesError {
        BytesError::Underflow {
            op,
            offset,
            length,
            limit,
            capacity: self.capacity(),
        }
    }

    /// Sequential read of `dst.len()` bytes at the read cursor. Lenient
    /// buffers zero-fill and stay put on underflow.
    fn read_sequential(&mut self, op: &'static str, dst: &mut [u8]) -> Result<()> {
        self.prepare()?;
        let offset = self.read_position;
        let len = dst.len() as u64;
        let result = self
            .read_check(op, offset, len, false)
            .and_then(|_| self.store.read_at(offset, dst));
        match result {
            Ok(()) => {
                self.read_position = offset + len;
                Ok(())
            }
            Err(e) if e.is_underflow() && self.lenient => {
                dst.fill(0);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Absolute read; the cursors do not move.
    fn read_absolute(&mut self, op: &'static str, offset: u64, dst: &mut [u8]) -> Result<()> {
        self.prepare()?;
        let result = self
            .read_check(op, offset, dst.len() as u64, true)
            .and_then(|_| self.store.read_at(offset, dst));
        match result {
            Err(e) if e.is_underflow() && self.lenient => {
                dst.fill(0);
                Ok(())
            }
            other => other,
        }
    }

    /// Sequential write of `src` at the write cursor.
    fn write_sequential(&mut self, op: &'static str, src: &[u8]) -> Result<()> {
        self.prepare()?;
        let offset = self.write_position;
        self.write_check(op, offset, src.len() as u64)?;
        self.store.write_at(offset, src)?;
        self.write_position = offset + src.len() as u64;
        Ok(())
    }

    /// Absolute write; the cursors do not move.
    fn write_absolute(&mut self, op: &'static str, offset: u64, src: &[u8]) -> Result<()> {
        self.prepare()?;
        self.write_check(op, offset, src.len() as u64)?;
        self.store.write_at(offset, src)
    }

    /// Write `src` just before the read cursor and move the cursor back.
    fn prewrite(&mut self, op: &'static str, src: &[u8]) -> Result<()> {
        self.prepare()?;
        let len = src.len() as u64;
        if self.checks_enabled()
            && (self.read_position < self.start() + len || self.read_position > self.read_limit())
        {
            return Err(self.overflow(op, self.read_position, len, self.start()));
        }
        let offset = self.read_position.checked_sub(len).ok_or_else(|| {
            BytesError::InvalidArgument(format!("{} of {} bytes before offset {}", op, len, self.read_position))
        })?;
        self.store.write_at(offset, src)?;
        self.read_position = offset;
        Ok(())
    }
}

/// Reject offsets and lengths that are really negative numbers.
fn check_offset(offset: u64) -> Result<()> {
    if offset > MAX_CAPACITY {
        return Err(BytesError::InvalidArgument(format!(
            "negative offset or length: {}",
            offset as i64
        )));
    }
    Ok(())
}

/// `position + count` for a signed count; negative results are invalid.
fn shift(position: u64, count: i64) -> Result<u64> {
    let target = (position as i64).checked_add(count).ok_or_else(|| {
        BytesError::InvalidArgument(format!("position {} + {} overflows", position, count))
    })?;
    if target < 0 {
        return Err(BytesError::Overflow {
            op: "skip",
            offset: position,
            length: count.unsigned_abs(),
            limit: 0,
            capacity: MAX_CAPACITY,
        });
    }
    Ok(target as u64)
}

impl<S: Backing> fmt::Display for Bytes<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_released() {
            return f.write_str("<released>");
        }
        let len = (self.read_remaining() as usize).min(DISPLAY_LIMIT);
        let mut buf = vec![0u8; len];
        if len > 0 && self.store.peek_at(self.read_position, &mut buf).is_err() {
            return f.write_str("<unreadable>");
        }
        for &b in &buf {
            if b.is_ascii_graphic() || b == b' ' || b == b'\n' || b == b'\t' {
                fmt::Write::write_char(f, b as char)?;
            } else {
                write!(f, "\\x{:02X}", b)?;
            }
        }
        if (self.read_remaining() as usize) > len {
            f.write_str("...")?;
        }
        Ok(())
    }
}

impl<S: Backing + fmt::Debug> fmt::Debug for Bytes<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bytes")
            .field("read_position", &self.read_position)
            .field("write_position", &self.write_position)
            .field("write_limit", &self.write_limit)
            .field("capacity", &self.capacity())
            .field("lenient", &self.lenient)
            .field("unchecked", &self.unchecked)
            .field("store", &self.store)
            .finish()
    }
}
