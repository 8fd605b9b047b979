//! Fixed-width reads and writes
//!
//! All values are little-endian. Each type gets a sequential and an absolute
//! read and write; a few also get a prewrite.

use crate::error::Result;
use crate::store::Backing;

use super::Bytes;

macro_rules! primitive_access {
    ($ty:ty, $size:expr, $read:ident, $read_at:ident, $write:ident, $write_at:ident) => {
        pub fn $read(&mut self) -> Result<$ty> {
            let mut buf = [0u8; $size];
            self.read_sequential(stringify!($read), &mut buf)?;
            Ok(<$ty>::from_le_bytes(buf))
        }

        pub fn $read_at(&mut self, offset: u64) -> Result<$ty> {
            let mut buf = [0u8; $size];
            self.read_absolute(stringify!($read_at), offset, &mut buf)?;
            Ok(<$ty>::from_le_bytes(buf))
        }

        pub fn $write(&mut self, value: $ty) -> Result<()> {
            self.write_sequential(stringify!($write), &value.to_le_bytes())
        }

        pub fn $write_at(&mut self, offset: u64, value: $ty) -> Result<()> {
            self.write_absolute(stringify!($write_at), offset, &value.to_le_bytes())
        }
    };
}

impl<S: Backing> Bytes<S> {
    primitive_access!(u8, 1, read_u8, read_u8_at, write_u8, write_u8_at);
    primitive_access!(i8, 1, read_i8, read_i8_at, write_i8, write_i8_at);
    primitive_access!(u16, 2, read_u16, read_u16_at, write_u16, write_u16_at);
    primitive_access!(i16, 2, read_i16, read_i16_at, write_i16, write_i16_at);
    primitive_access!(u32, 4, read_u32, read_u32_at, write_u32, write_u32_at);
    primitive_access!(i32, 4, read_i32, read_i32_at, write_i32, write_i32_at);
    primitive_access!(u64, 8, read_u64, read_u64_at, write_u64, write_u64_at);
    primitive_access!(i64, 8, read_i64, read_i64_at, write_i64, write_i64_at);
    primitive_access!(f32, 4, read_f32, read_f32_at, write_f32, write_f32_at);
    primitive_access!(f64, 8, read_f64, read_f64_at, write_f64, write_f64_at);

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)
    }

    // =========================================================================
    // End-of-data Aware Reads
    // =========================================================================

    /// Next byte, or `None` at the read limit. Never fails on end of data.
    pub fn read_unsigned_byte(&mut self) -> Result<Option<u8>> {
        self.prepare()?;
        if self.read_position >= self.read_limit() {
            return Ok(None);
        }
        let mut buf = [0u8; 1];
        self.store.read_at(self.read_position, &mut buf)?;
        self.read_position += 1;
        Ok(Some(buf[0]))
    }

    /// Byte at the read cursor without consuming it.
    pub fn peek_unsigned_byte(&self) -> Result<Option<u8>> {
        self.peek_unsigned_byte_at(self.read_position)
    }

    /// Byte at `offset` if it lies before the read limit.
    pub fn peek_unsigned_byte_at(&self, offset: u64) -> Result<Option<u8>> {
        if offset < self.start() || offset >= self.read_limit() {
            return Ok(None);
        }
        let mut buf = [0u8; 1];
        self.store.peek_at(offset, &mut buf)?;
        Ok(Some(buf[0]))
    }

    // =========================================================================
    // Slices
    // =========================================================================

    pub fn write_slice(&mut self, src: &[u8]) -> Result<()> {
        self.write_sequential("write slice", src)
    }

    pub fn write_slice_at(&mut self, offset: u64, src: &[u8]) -> Result<()> {
        self.write_absolute("write slice at", offset, src)
    }

    /// Fill `dst` completely from the read cursor.
    pub fn read_exact(&mut self, dst: &mut [u8]) -> Result<()> {
        self.read_sequential("read exact", dst)
    }

    pub fn read_slice_at(&mut self, offset: u64, dst: &mut [u8]) -> Result<()> {
        self.read_absolute("read slice at", offset, dst)
    }

    /// Read up to `dst.len()` bytes; returns how many were read (zero at the
    /// read limit).
    pub fn read_into(&mut self, dst: &mut [u8]) -> Result<usize> {
        let n = (dst.len() as u64).min(self.read_remaining()) as usize;
        self.read_sequential("read into", &mut dst[..n])?;
        Ok(n)
    }

    /// Fill `len` bytes at the write cursor with zeros.
    pub fn zero_out(&mut self, len: u64) -> Result<()> {
        self.prepare()?;
        let offset = self.write_position;
        self.write_check("zero out", offset, len)?;
        let zeros = [0u8; 256];
        let mut done = 0u64;
        while done < len {
            let n = (len - done).min(zeros.len() as u64) as usize;
            self.store.write_at(offset + done, &zeros[..n])?;
            done += n as u64;
        }
        self.write_position = offset + len;
        Ok(())
    }

    // =========================================================================
    // Prewrite
    // =========================================================================

    pub fn prewrite_u8(&mut self, value: u8) -> Result<()> {
        self.prewrite("prewrite u8", &[value])
    }

    pub fn prewrite_i16(&mut self, value: i16) -> Result<()> {
        self.prewrite("prewrite i16", &value.to_le_bytes())
    }

    pub fn prewrite_i32(&mut self, value: i32) -> Result<()> {
        self.prewrite("prewrite i32", &value.to_le_bytes())
    }

    pub fn prewrite_i64(&mut self, value: i64) -> Result<()> {
        self.prewrite("prewrite i64", &value.to_le_bytes())
    }

    pub fn prewrite_slice(&mut self, src: &[u8]) -> Result<()> {
        self.prewrite("prewrite slice", src)
    }
}
