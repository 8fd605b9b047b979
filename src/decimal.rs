//! Decimal rendering for floating point appends
//!
//! A `Decimaliser` turns a float into `mantissa / 10^exponent` form so the
//! buffer can write the digits directly. Returning `None` declines the value
//! and the buffer falls back to the float's `Display` text.

/// Largest number of decimal places tried
pub const MAX_PRECISION: u32 = 18;

/// Mantissa limit; larger values are declined
const MANTISSA_LIMIT: f64 = 1e18;

/// `value = (-1)^negative * mantissa / 10^exponent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    pub negative: bool,
    pub mantissa: u64,
    pub exponent: u32,
}

impl Decimal {
    /// Render as ASCII. An exponent of zero still gets a `.0` so the text
    /// reads back as a float.
    pub fn write_ascii(&self, out: &mut Vec<u8>) {
        if self.negative {
            out.push(b'-');
        }
        let digits = self.mantissa.to_string();
        let places = self.exponent as usize;
        if places == 0 {
            out.extend_from_slice(digits.as_bytes());
            out.extend_from_slice(b".0");
        } else if digits.len() > places {
            let (int, frac) = digits.split_at(digits.len() - places);
            out.extend_from_slice(int.as_bytes());
            out.push(b'.');
            out.extend_from_slice(frac.as_bytes());
        } else {
            out.extend_from_slice(b"0.");
            out.extend(std::iter::repeat(b'0').take(places - digits.len()));
            out.extend_from_slice(digits.as_bytes());
        }
    }
}

/// Strategy for converting floats to decimals
pub trait Decimaliser: Send + Sync {
    fn to_decimal(&self, value: f64) -> Option<Decimal>;

    fn to_decimal_f32(&self, value: f32) -> Option<Decimal>;
}

/// Finds the fewest decimal places, up to `MAX_PRECISION`, that reproduce
/// the value exactly. Declines non-finite and very large values.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardDecimaliser;

/// Declines everything, so every append uses the `Display` fallback
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDecimaliser;

pub static STANDARD: StandardDecimaliser = StandardDecimaliser;

impl StandardDecimaliser {
    fn search(negative: bool, abs: f64, matches: impl Fn(f64) -> bool) -> Option<Decimal> {
        if !abs.is_finite() || abs >= MANTISSA_LIMIT {
            return None;
        }
        let mut factor = 1.0f64;
        for exponent in 0..=MAX_PRECISION {
            let scaled = abs * factor;
            if scaled >= MANTISSA_LIMIT {
                return None;
            }
            let mantissa = scaled.round();
            if matches(mantissa / factor) {
                return Some(Decimal {
                    negative,
                    mantissa: mantissa as u64,
                    exponent,
                });
            }
            factor *= 10.0;
        }
        None
    }
}

impl Decimaliser for StandardDecimaliser {
    fn to_decimal(&self, value: f64) -> Option<Decimal> {
        let abs = value.abs();
        Self::search(value.is_sign_negative(), abs, |candidate| candidate == abs)
    }

    fn to_decimal_f32(&self, value: f32) -> Option<Decimal> {
        let abs = value.abs();
        Self::search(value.is_sign_negative(), abs as f64, |candidate| {
            candidate as f32 == abs
        })
    }
}

impl Decimaliser for NoDecimaliser {
    fn to_decimal(&self, _value: f64) -> Option<Decimal> {
        None
    }

    fn to_decimal_f32(&self, _value: f32) -> Option<Decimal> {
        None
    }
}
