//! Atomic and ordered access, raw addresses
//!
//! CAS needs a naturally aligned offset and, on a mapped store, a range that
//! sits wholly inside one chunk's non-overlap part, so a spin loop never
//! straddles two mappings.

use crate::error::Result;
use crate::refcount::{OwnerId, ReferenceCounted};
use crate::store::Backing;

use super::Bytes;

impl<S: Backing> Bytes<S> {
    pub fn compare_and_swap_i32(&mut self, offset: u64, expected: i32, value: i32) -> Result<bool> {
        self.prepare()?;
        self.write_check("compare and swap i32", offset, 4)?;
        self.store
            .region_for_atomic(offset, 4)?
            .compare_and_swap_i32(offset, expected, value)
    }

    pub fn compare_and_swap_i64(&mut self, offset: u64, expected: i64, value: i64) -> Result<bool> {
        self.prepare()?;
        self.write_check("compare and swap i64", offset, 8)?;
        self.store
            .region_for_atomic(offset, 8)?
            .compare_and_swap_i64(offset, expected, value)
    }

    /// Atomically add `delta` to the i64 at `offset`, returning the result.
    pub fn add_and_get_i64(&mut self, offset: u64, delta: i64) -> Result<i64> {
        loop {
            let current = self.read_volatile_i64_at(offset)?;
            let next = current.wrapping_add(delta);
            if self.compare_and_swap_i64(offset, current, next)? {
                return Ok(next);
            }
            std::hint::spin_loop();
        }
    }

    pub fn read_volatile_i32_at(&mut self, offset: u64) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_volatile_at("read volatile i32", offset, &mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn read_volatile_i64_at(&mut self, offset: u64) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_volatile_at("read volatile i64", offset, &mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    pub fn write_ordered_i32_at(&mut self, offset: u64, value: i32) -> Result<()> {
        self.write_ordered_at("write ordered i32", offset, &value.to_le_bytes())
    }

    pub fn write_ordered_i64_at(&mut self, offset: u64, value: i64) -> Result<()> {
        self.write_ordered_at("write ordered i64", offset, &value.to_le_bytes())
    }

    fn read_volatile_at(&mut self, op: &'static str, offset: u64, dst: &mut [u8]) -> Result<()> {
        self.prepare()?;
        self.read_check(op, offset, dst.len() as u64, true)?;
        self.store
            .region_for_atomic(offset, dst.len() as u64)?
            .read_volatile(offset, dst)
    }

    fn write_ordered_at(&mut self, op: &'static str, offset: u64, src: &[u8]) -> Result<()> {
        self.prepare()?;
        self.write_check(op, offset, src.len() as u64)?;
        self.store
            .region_for_atomic(offset, src.len() as u64)?
            .write_ordered(offset, src)
    }

    // =========================================================================
    // Raw Addresses
    // =========================================================================

    /// Address of `offset`, valid for reading up to the end of the region
    /// that now holds it, and only while this buffer stays on that region.
    pub fn address_for_read(&mut self, offset: u64) -> Result<*const u8> {
        self.prepare()?;
        self.read_check("address for read", offset, 0, true)?;
        self.store.address_for_read(offset)
    }

    /// Address of `offset` valid for reading `len` contiguous bytes.
    pub fn address_for_read_len(&mut self, offset: u64, len: u64) -> Result<*const u8> {
        self.prepare()?;
        self.read_check("address for read", offset, len, true)?;
        self.store.address_for_read_len(offset, len)
    }

    pub fn address_for_write(&mut self, offset: u64) -> Result<*mut u8> {
        self.prepare()?;
        self.write_check("address for write", offset, 0)?;
        self.store.address_for_write(offset)
    }

    /// Address of the write cursor.
    pub fn address_for_write_position(&mut self) -> Result<*mut u8> {
        self.address_for_write(self.write_position)
    }

    /// Run `f` while an extra reservation is held on the current region, so
    /// a concurrent release elsewhere cannot free it mid-call.
    pub fn with_guard<T>(&self, label: &'static str, f: impl FnOnce(&Self) -> T) -> Result<T> {
        let Some(region) = self.store.current() else {
            return Ok(f(self));
        };
        let guard = OwnerId::temporary(label);
        region.reserve(guard)?;
        let out = f(self);
        region.release(guard)?;
        Ok(out)
    }
}
