//! Numbers as ASCII text
//!
//! Integer appends format digits on the stack and copy them in one write.
//! Float appends go through the buffer's `Decimaliser`, falling back to the
//! value's `Display` text when it declines. Every append and parse updates
//! `last_decimal_places` and `last_number_had_digits`.

use crate::error::{BytesError, Result};
use crate::store::Backing;

use super::Bytes;

/// `i64::MIN` has no positive counterpart to format from.
const MIN_VALUE_TEXT: &[u8] = b"-9223372036854775808";

/// Widest formatted i64, sign included
const MAX_I64_DIGITS: usize = 20;

/// Largest decimal places handled without falling back to `format!`
const MAX_FAST_PLACES: u32 = 18;

/// Format `value` right-aligned into `buf`; returns the digit count used.
fn format_i64(value: i64, buf: &mut [u8; MAX_I64_DIGITS]) -> usize {
    let negative = value < 0;
    let mut n = value.unsigned_abs();
    let mut pos = MAX_I64_DIGITS;
    loop {
        pos -= 1;
        buf[pos] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    if negative {
        pos -= 1;
        buf[pos] = b'-';
    }
    MAX_I64_DIGITS - pos
}

/// Text of a number as it sat in the buffer
struct Scanned {
    text: Vec<u8>,
    /// Bytes consumed, including one terminating byte if present
    consumed: u64,
}

impl<S: Backing> Bytes<S> {
    // =========================================================================
    // Append
    // =========================================================================

    pub fn append_i64(&mut self, value: i64) -> Result<()> {
        if value == i64::MIN {
            self.write_sequential("append i64", MIN_VALUE_TEXT)?;
        } else {
            let mut buf = [0u8; MAX_I64_DIGITS];
            let len = format_i64(value, &mut buf);
            self.write_sequential("append i64", &buf[MAX_I64_DIGITS - len..])?;
        }
        self.last_decimal_places = 0;
        self.last_number_had_digits = true;
        Ok(())
    }

    pub fn append_i32(&mut self, value: i32) -> Result<()> {
        self.append_i64(value as i64)
    }

    pub fn append_f64(&mut self, value: f64) -> Result<()> {
        match self.decimaliser.to_decimal(value) {
            Some(decimal) => {
                let mut out = Vec::with_capacity(24);
                decimal.write_ascii(&mut out);
                self.write_sequential("append f64", &out)?;
                self.last_decimal_places = decimal.exponent as i32;
            }
            None => self.append_display(value.to_string())?,
        }
        self.last_number_had_digits = true;
        Ok(())
    }

    pub fn append_f32(&mut self, value: f32) -> Result<()> {
        match self.decimaliser.to_decimal_f32(value) {
            Some(decimal) => {
                let mut out = Vec::with_capacity(16);
                decimal.write_ascii(&mut out);
                self.write_sequential("append f32", &out)?;
                self.last_decimal_places = decimal.exponent as i32;
            }
            None => self.append_display(value.to_string())?,
        }
        self.last_number_had_digits = true;
        Ok(())
    }

    /// Append `value` rounded half away from zero to `places` decimals.
    pub fn append_f64_places(&mut self, value: f64, places: u32) -> Result<()> {
        let factor = 10f64.powi(places as i32);
        let scaled = (value.abs() * factor).round();
        if value.is_finite() && places <= MAX_FAST_PLACES && scaled < 1e18 {
            let mantissa = scaled as u64;
            let mut out = Vec::with_capacity(24);
            if value < 0.0 && mantissa != 0 {
                out.push(b'-');
            }
            let digits = mantissa.to_string();
            let places = places as usize;
            if places == 0 {
                out.extend_from_slice(digits.as_bytes());
            } else {
                let padded = format!("{:0>width$}", digits, width = places + 1);
                let (int, frac) = padded.split_at(padded.len() - places);
                out.extend_from_slice(int.as_bytes());
                out.push(b'.');
                out.extend_from_slice(frac.as_bytes());
            }
            self.write_sequential("append f64 places", &out)?;
        } else {
            self.write_sequential(
                "append f64 places",
                format!("{:.*}", places as usize, value).as_bytes(),
            )?;
        }
        self.last_decimal_places = places as i32;
        self.last_number_had_digits = true;
        Ok(())
    }

    /// Write `value` zero-padded to exactly `width` characters at `offset`
    /// without moving the cursors.
    pub fn append_i64_at_fixed(&mut self, offset: u64, value: i64, width: usize) -> Result<()> {
        let text = format!("{:0width$}", value, width = width);
        if text.len() > width {
            return Err(BytesError::InvalidArgument(format!(
                "{} does not fit in {} digits",
                value, width
            )));
        }
        self.write_absolute("append fixed", offset, text.as_bytes())
    }

    fn append_display(&mut self, text: String) -> Result<()> {
        self.last_decimal_places = text
            .split_once('.')
            .map_or(0, |(_, frac)| frac.bytes().take_while(u8::is_ascii_digit).count() as i32);
        self.write_sequential("append display", text.as_bytes())
    }

    // =========================================================================
    // Parse
    // =========================================================================

    /// Parse an integer at the read cursor, consuming one terminating byte.
    pub fn parse_i64(&mut self) -> Result<i64> {
        self.prepare()?;
        let scanned = self.scan_number(self.read_position, self.read_limit(), false)?;
        let value = self.integer_from(&scanned.text)?;
        self.read_position += scanned.consumed;
        Ok(value)
    }

    /// Parse an integer at `offset` without moving the cursors.
    pub fn parse_i64_at(&mut self, offset: u64) -> Result<i64> {
        self.prepare()?;
        self.read_check("parse i64 at", offset, 0, true)?;
        let scanned = self.scan_number(offset, self.write_limit, false)?;
        self.integer_from(&scanned.text)
    }

    /// Parse a decimal or scientific number at the read cursor.
    pub fn parse_f64(&mut self) -> Result<f64> {
        self.prepare()?;
        let scanned = self.scan_number(self.read_position, self.read_limit(), true)?;
        let text = std::str::from_utf8(&scanned.text)
            .map_err(|e| BytesError::NumericFormat(e.to_string()))?;

        self.last_number_had_digits = text.bytes().any(|b| b.is_ascii_digit());
        if !self.last_number_had_digits {
            return Err(BytesError::NumericFormat(format!("no digits in {:?}", text)));
        }
        self.last_decimal_places = text
            .split_once('.')
            .map_or(0, |(_, frac)| frac.bytes().take_while(u8::is_ascii_digit).count() as i32);
        let value = text
            .parse::<f64>()
            .map_err(|e| BytesError::NumericFormat(format!("{:?}: {}", text, e)))?;
        self.read_position += scanned.consumed;
        Ok(value)
    }

    fn integer_from(&mut self, text: &[u8]) -> Result<i64> {
        self.last_decimal_places = 0;
        let (negative, digits) = match text.first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        self.last_number_had_digits = !digits.is_empty();
        if digits.is_empty() {
            return Err(BytesError::NumericFormat("no digits".to_string()));
        }

        // Accumulate negatively so i64::MIN parses.
        let mut acc: i64 = 0;
        for &d in digits {
            acc = acc
                .checked_mul(10)
                .and_then(|a| a.checked_sub((d - b'0') as i64))
                .ok_or_else(|| {
                    BytesError::NumericFormat(format!(
                        "{} overflows i64",
                        String::from_utf8_lossy(text)
                    ))
                })?;
        }
        if negative {
            Ok(acc)
        } else {
            acc.checked_neg()
                .ok_or_else(|| BytesError::NumericFormat("overflows i64".to_string()))
        }
    }

    /// Skip leading whitespace and collect sign, digits and (for floats) the
    /// fraction and exponent, stopping at `limit`.
    fn scan_number(&mut self, offset: u64, limit: u64, float: bool) -> Result<Scanned> {
        let mut pos = offset;
        let mut text = Vec::new();
        let mut byte = [0u8; 1];

        while pos < limit {
            self.store.read_at(pos, &mut byte)?;
            if !byte[0].is_ascii_whitespace() {
                break;
            }
            pos += 1;
        }

        while pos < limit {
            self.store.read_at(pos, &mut byte)?;
            let b = byte[0];
            pos += 1;
            let accept = match b {
                b'0'..=b'9' => true,
                b'-' | b'+' => {
                    text.is_empty() || (float && matches!(text.last().copied(), Some(b'e' | b'E')))
                }
                b'.' | b'e' | b'E' => float,
                b'_' => continue,
                _ => false,
            };
            if !accept {
                break;
            }
            text.push(b);
        }

        Ok(Scanned {
            text,
            consumed: pos - offset,
        })
    }
}
