//! Stop-bit varints and length-prefixed data
//!
//! ## Encoding
//! ```text
//!   n >= 0:  7 bits per byte, low bits first, high bit = "more follows"
//!            300  → AC 02
//!   n <  0:  encode !n the same way, then end with 80 00
//!            -1   → 80 00
//! ```
//!
//! A length prefix is a stop-bit number; `-1` marks an absent value.

use crate::error::{BytesError, Result};
use crate::store::Backing;

use super::Bytes;

/// Longest stop-bit encoding of an i64 (nine 7-bit groups plus the 00 tail)
const MAX_STOP_BIT_LEN: usize = 10;

/// Encode `value` into `out`, returning the number of bytes used.
pub(crate) fn encode_stop_bit(value: i64, out: &mut [u8; MAX_STOP_BIT_LEN]) -> usize {
    let (mut n, negative) = if value < 0 {
        (!value as u64, true)
    } else {
        (value as u64, false)
    };
    let mut len = 0;
    while n >> 7 != 0 {
        out[len] = ((n & 0x7F) | 0x80) as u8;
        len += 1;
        n >>= 7;
    }
    if negative {
        out[len] = (n as u8) | 0x80;
        out[len + 1] = 0;
        len + 2
    } else {
        out[len] = n as u8;
        len + 1
    }
}

impl<S: Backing> Bytes<S> {
    // =========================================================================
    // Stop-bit Numbers
    // =========================================================================

    pub fn write_stop_bit(&mut self, value: i64) -> Result<()> {
        let mut buf = [0u8; MAX_STOP_BIT_LEN];
        let len = encode_stop_bit(value, &mut buf);
        self.write_sequential("write stop bit", &buf[..len])
    }

    pub fn read_stop_bit(&mut self) -> Result<i64> {
        let first = self.read_i8()?;
        if first >= 0 {
            return Ok(first as i64);
        }

        let mut acc = (first as u64) & 0x7F;
        let mut shift = 7u32;
        loop {
            let b = self.read_i8()?;
            if b < 0 {
                if shift > 56 {
                    return Err(BytesError::NumericFormat(
                        "stop-bit number has too many bytes".to_string(),
                    ));
                }
                acc |= ((b as u64) & 0x7F) << shift;
                shift += 7;
                continue;
            }
            if b != 0 {
                if shift > 56 {
                    return Err(BytesError::NumericFormat(
                        "stop-bit number has too many bytes".to_string(),
                    ));
                }
                return Ok((acc | ((b as u64) << shift)) as i64);
            }
            if shift > 63 {
                return Err(BytesError::NumericFormat(
                    "negative stop-bit number has too many bytes".to_string(),
                ));
            }
            return Ok(!(acc as i64));
        }
    }

    pub fn write_stop_bit_char(&mut self, ch: char) -> Result<()> {
        self.write_stop_bit(ch as i64)
    }

    pub fn read_stop_bit_char(&mut self) -> Result<char> {
        let code = self.read_stop_bit()?;
        u32::try_from(code)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| BytesError::NumericFormat(format!("{} is not a char", code)))
    }

    // =========================================================================
    // Length-prefixed Bytes
    // =========================================================================

    pub fn write_with_length(&mut self, data: &[u8]) -> Result<()> {
        self.write_stop_bit(data.len() as i64)?;
        self.write_slice(data)
    }

    /// Read a length-prefixed range. An absent value (`-1`) reads as empty.
    pub fn read_with_length(&mut self) -> Result<::bytes::Bytes> {
        let data = self.read_length_prefixed("read with length")?;
        Ok(data.map_or_else(::bytes::Bytes::new, ::bytes::Bytes::from))
    }

    /// Prefix then payload; `None` for the `-1` marker.
    pub(super) fn read_length_prefixed(&mut self, op: &'static str) -> Result<Option<Vec<u8>>> {
        let len = self.read_stop_bit()?;
        if len == -1 {
            return Ok(None);
        }
        if len < -1 {
            return Err(BytesError::NumericFormat(format!("negative length {}", len)));
        }
        let len = len as u64;
        let remaining = self.read_remaining();
        let len = if len > remaining {
            if !self.lenient {
                return Err(self.underflow(op, self.read_position, len, self.read_limit()));
            }
            remaining
        } else {
            len
        };
        let mut data = vec![0u8; len as usize];
        self.read_exact(&mut data)?;
        Ok(Some(data))
    }

    // =========================================================================
    // Strings
    // =========================================================================

    /// Write a Latin-1 string with a stop-bit length.
    pub fn write_8bit(&mut self, text: &str) -> Result<()> {
        let encoded = text
            .chars()
            .map(|c| {
                u8::try_from(c).map_err(|_| {
                    BytesError::InvalidArgument(format!("'{}' is not an 8-bit character", c))
                })
            })
            .collect::<Result<Vec<u8>>>()?;
        self.write_with_length(&encoded)
    }

    /// Write the absent-string marker.
    pub fn write_8bit_none(&mut self) -> Result<()> {
        self.write_stop_bit(-1)
    }

    pub fn read_8bit(&mut self) -> Result<Option<String>> {
        Ok(self
            .read_length_prefixed("read 8bit")?
            .map(|data| data.into_iter().map(char::from).collect()))
    }

    /// Write UTF-8 text with its byte length as a stop-bit prefix.
    pub fn write_utf8(&mut self, text: &str) -> Result<()> {
        self.write_with_length(text.as_bytes())
    }

    pub fn read_utf8(&mut self) -> Result<Option<String>> {
        match self.read_length_prefixed("read utf8")? {
            None => Ok(None),
            Some(data) => String::from_utf8(data)
                .map(Some)
                .map_err(|e| BytesError::NumericFormat(format!("invalid UTF-8: {}", e))),
        }
    }
}
