//! Text Long Array
//!
//! A long array stored as human-readable ASCII so it can be inspected (or
//! edited) with a text editor while a mapped file is live.
//!
//! ## Layout
//! ```text
//!   offset
//!   │
//!   { locked: false, capacity: 3                   , used: 00000000000000000000, values: [ v0, v1, v2 ] }\n
//!           └─lock─┘           └─ 20 cols, space padded┘     └───── USED ──────┘            └ 20 digits each
//! ```
//!
//! Each value is exactly 20 characters (zero padded, `-` in front when
//! negative) followed by `", "`, so value *i* sits at
//! `VALUES + i * VALUE_SIZE`. Total length for *n* values:
//! `VALUES + 20n + 2·max(n - 1, 0) + 5`.
//!
//! ## Locking
//! `set_max_used` and `compare_and_set` take a spin lock by CAS-ing the
//! 8-byte word `": false,"` to `":  true,"`. The word sits at offset 8 of
//! the array, so arrays must start on an 8-byte boundary.

use std::sync::atomic::{fence, Ordering};

use crate::bytes::Bytes;
use crate::error::{BytesError, Result};
use crate::store::Backing;

const SECTION1: &[u8] = b"{ locked: false, capacity: ";
const SECTION2: &[u8] = b", used: ";
const SECTION3: &[u8] = b", values: [ ";
const SECTION4: &[u8] = b" ] }\n";
const ZERO: &[u8] = b"00000000000000000000";
const SEP: &[u8] = b", ";

const DIGITS: u64 = ZERO.len() as u64;
const CAPACITY: u64 = SECTION1.len() as u64;
const USED: u64 = CAPACITY + DIGITS + SECTION2.len() as u64;
const VALUES: u64 = USED + DIGITS + SECTION3.len() as u64;
const VALUE_SIZE: u64 = DIGITS + SEP.len() as u64;

/// Offset of the aligned word holding the lock text
const LOCK_WORD: u64 = 8;
const UNLOCKED: i64 = i64::from_le_bytes(*b": false,");
const LOCKED: i64 = i64::from_le_bytes(*b":  true,");

/// Handle to a text long array at a fixed offset of some buffer
///
/// The handle holds no reference to the buffer; every access takes the
/// buffer the array was written to or bound in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLongArray {
    offset: u64,
    length: u64,
}

impl TextLongArray {
    /// Bytes needed for an array of `capacity` values, saturating at
    /// `u64::MAX`.
    pub fn size_in_bytes(capacity: u64) -> u64 {
        checked_size(capacity).unwrap_or(u64::MAX)
    }

    /// Write an empty array of `capacity` values at the write cursor and
    /// return a handle bound to it.
    pub fn write<S: Backing>(bytes: &mut Bytes<S>, capacity: u64) -> Result<Self> {
        let start = bytes.write_position();
        check_aligned(start)?;

        bytes.write_slice(SECTION1)?;
        bytes.append_i64(capacity as i64)?;
        while bytes.write_position() - start < CAPACITY + DIGITS {
            bytes.write_u8(b' ')?;
        }
        bytes.write_slice(SECTION2)?;
        bytes.write_slice(ZERO)?;
        bytes.write_slice(SECTION3)?;
        for i in 0..capacity {
            if i > 0 {
                bytes.write_slice(SEP)?;
            }
            bytes.write_slice(ZERO)?;
        }
        bytes.write_slice(SECTION4)?;

        Ok(Self {
            offset: start,
            length: bytes.write_position() - start,
        })
    }

    /// Length of the array at `offset`, derived from its capacity field.
    pub fn peek_length<S: Backing>(bytes: &mut Bytes<S>, offset: u64) -> Result<u64> {
        let capacity = bytes.parse_i64_at(offset + CAPACITY)?;
        if capacity < 0 {
            return Err(BytesError::NumericFormat(format!(
                "negative capacity {} at {}",
                capacity, offset
            )));
        }
        checked_size(capacity as u64).ok_or_else(|| {
            BytesError::NumericFormat(format!("capacity {} at {} is too large", capacity, offset))
        })
    }

    /// Bind to an array already present at `offset`, checking that its
    /// layout spans exactly `length` bytes.
    pub fn bind<S: Backing>(bytes: &mut Bytes<S>, offset: u64, length: u64) -> Result<Self> {
        check_aligned(offset)?;
        let peeked = Self::peek_length(bytes, offset)?;
        if peeked != length {
            return Err(BytesError::InvalidArgument(format!(
                "text long array at {} is {} bytes, not {}",
                offset, peeked, length
            )));
        }
        Ok(Self { offset, length })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes spanned by the array.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.capacity() == 0
    }

    /// Number of values the array holds.
    pub fn capacity(&self) -> u64 {
        let body = self.length - VALUES - SECTION4.len() as u64;
        if body == 0 {
            0
        } else {
            (body + SEP.len() as u64) / VALUE_SIZE
        }
    }

    // =========================================================================
    // Used Count
    // =========================================================================

    pub fn used<S: Backing>(&self, bytes: &mut Bytes<S>) -> Result<u64> {
        let used = bytes.parse_i64_at(self.offset + USED)?;
        Ok(used.max(0) as u64)
    }

    pub fn set_used<S: Backing>(&self, bytes: &mut Bytes<S>, used: u64) -> Result<()> {
        bytes.append_i64_at_fixed(self.offset + USED, used as i64, DIGITS as usize)
    }

    /// Raise the used count to at least `used_at_least`, under the lock.
    pub fn set_max_used<S: Backing>(&self, bytes: &mut Bytes<S>, used_at_least: u64) -> Result<()> {
        while !self.try_lock(bytes)? {
            std::hint::spin_loop();
        }
        let result = self.used(bytes).and_then(|used| {
            if used < used_at_least {
                self.set_used(bytes, used_at_least)
            } else {
                Ok(())
            }
        });
        self.unlock(bytes)?;
        result
    }

    // =========================================================================
    // Values
    // =========================================================================

    pub fn get_value_at<S: Backing>(&self, bytes: &mut Bytes<S>, index: u64) -> Result<i64> {
        let at = self.value_offset(index)?;
        bytes.parse_i64_at(at)
    }

    pub fn set_value_at<S: Backing>(&self, bytes: &mut Bytes<S>, index: u64, value: i64) -> Result<()> {
        let at = self.value_offset(index)?;
        bytes.append_i64_at_fixed(at, value, DIGITS as usize)
    }

    pub fn get_volatile_value_at<S: Backing>(&self, bytes: &mut Bytes<S>, index: u64) -> Result<i64> {
        fence(Ordering::Acquire);
        self.get_value_at(bytes, index)
    }

    pub fn set_ordered_value_at<S: Backing>(&self, bytes: &mut Bytes<S>, index: u64, value: i64) -> Result<()> {
        self.set_value_at(bytes, index, value)?;
        fence(Ordering::Release);
        Ok(())
    }

    /// Set value `index` to `value` if it currently equals `expected`.
    ///
    /// Returns `false` without waiting if another writer holds the lock.
    pub fn compare_and_set<S: Backing>(
        &self,
        bytes: &mut Bytes<S>,
        index: u64,
        expected: i64,
        value: i64,
    ) -> Result<bool> {
        self.value_offset(index)?;
        if !self.try_lock(bytes)? {
            return Ok(false);
        }
        let result = self.get_volatile_value_at(bytes, index).and_then(|current| {
            if current == expected {
                self.set_ordered_value_at(bytes, index, value).map(|_| true)
            } else {
                Ok(false)
            }
        });
        self.unlock(bytes)?;
        result
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn value_offset(&self, index: u64) -> Result<u64> {
        let capacity = self.capacity();
        if index >= capacity {
            return Err(BytesError::InvalidArgument(format!(
                "index {} out of range for capacity {}",
                index, capacity
            )));
        }
        Ok(self.offset + VALUES + index * VALUE_SIZE)
    }

    fn try_lock<S: Backing>(&self, bytes: &mut Bytes<S>) -> Result<bool> {
        bytes.compare_and_swap_i64(self.offset + LOCK_WORD, UNLOCKED, LOCKED)
    }

    fn unlock<S: Backing>(&self, bytes: &mut Bytes<S>) -> Result<()> {
        bytes.write_ordered_i64_at(self.offset + LOCK_WORD, UNLOCKED)
    }
}

fn checked_size(capacity: u64) -> Option<u64> {
    let digits = capacity.checked_mul(DIGITS)?;
    let seps = capacity.saturating_sub(1).checked_mul(SEP.len() as u64)?;
    VALUES
        .checked_add(digits)?
        .checked_add(seps)?
        .checked_add(SECTION4.len() as u64)
}

fn check_aligned(offset: u64) -> Result<()> {
    if offset % 8 != 0 {
        return Err(BytesError::InvalidArgument(format!(
            "text long array must start on an 8-byte boundary, not {}",
            offset
        )));
    }
    Ok(())
}
