//! Fixed-point decimal used by the decimal scalar accessor.
//!
//! Stored as an `i128` mantissa plus a base-10 scale, the same layout as a
//! `Decimal128` column. Enough for lossless round trips of database `NUMERIC`
//! text; arithmetic is left to the caller.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const MAX_SCALE: u32 = 38;

#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid decimal literal: {0}")]
pub struct ParseDecimalError(String);

impl Decimal {
    pub const ZERO: Decimal = Decimal {
        mantissa: 0,
        scale: 0,
    };

    #[must_use]
    pub fn new(mantissa: i128, scale: u32) -> Self {
        Self { mantissa, scale }
    }

    #[must_use]
    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    #[must_use]
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Drop trailing fractional zeros (`1.500` becomes `1.5`).
    #[must_use]
    pub fn normalize(self) -> Self {
        let mut mantissa = self.mantissa;
        let mut scale = self.scale;
        while scale > 0 && mantissa % 10 == 0 {
            mantissa /= 10;
            scale -= 1;
        }
        Self { mantissa, scale }
    }

    /// Lossy conversion for display or arithmetic in floating point.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(self.mantissa as f64)
    }

    /// Convert through the shortest decimal representation of `value`.
    ///
    /// # Errors
    /// Returns `ParseDecimalError` for NaN and infinities.
    pub fn try_from_f64(value: f64) -> Result<Self, ParseDecimalError> {
        if !value.is_finite() {
            return Err(ParseDecimalError(value.to_string()));
        }
        value.to_string().parse()
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::new(i128::from(value), 0)
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = || ParseDecimalError(s.to_string());
        let (negative, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let scale = u32::try_from(frac_part.len()).map_err(|_| err())?;
        if scale > MAX_SCALE {
            return Err(err());
        }
        let mut mantissa: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(b - b'0')))
                .ok_or_else(err)?;
        }
        if negative {
            mantissa = -mantissa;
        }
        Ok(Self { mantissa, scale })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.normalize();
        let b = other.normalize();
        let scale = a.scale.max(b.scale);
        match (rescale(a, scale), rescale(b, scale)) {
            (Some(x), Some(y)) => x.cmp(&y),
            // Overflow only happens far outside any column precision; fall back to floats.
            _ => a.to_f64().total_cmp(&b.to_f64()),
        }
    }
}

fn rescale(value: Decimal, scale: u32) -> Option<i128> {
    10i128
        .checked_pow(scale - value.scale)
        .and_then(|factor| value.mantissa.checked_mul(factor))
}
