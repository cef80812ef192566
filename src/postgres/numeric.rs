//! Binary `NUMERIC` wire format.
//!
//! `ndigits: i16, weight: i16, sign: u16, dscale: u16`, then `ndigits`
//! base-10000 digits, most significant first. `weight` is the power of 10000
//! of the first digit.

use std::error::Error;

use tokio_postgres::types::{FromSql, Type};
use tokio_util::bytes::{BufMut, BytesMut};

use crate::decimal::Decimal;

const SIGN_POSITIVE: u16 = 0x0000;
const SIGN_NEGATIVE: u16 = 0x4000;
const NBASE: u128 = 10_000;

type BoxedError = Box<dyn Error + Sync + Send>;

/// `NUMERIC` column value read as a [`Decimal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgNumeric(pub Decimal);

fn read_u16(raw: &[u8], at: usize) -> Result<u16, BoxedError> {
    raw.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| "truncated numeric value".into())
}

pub(crate) fn decode(raw: &[u8]) -> Result<Decimal, BoxedError> {
    let ndigits = read_u16(raw, 0)? as usize;
    let weight = i64::from(read_u16(raw, 2)? as i16);
    let sign = read_u16(raw, 4)?;
    let dscale = u32::from(read_u16(raw, 6)?);
    if sign != SIGN_POSITIVE && sign != SIGN_NEGATIVE {
        return Err("NaN and infinite numerics have no decimal form".into());
    }

    let mut mantissa: i128 = 0;
    for i in 0..ndigits {
        let digit = i128::from(read_u16(raw, 8 + 2 * i)?);
        mantissa = mantissa
            .checked_mul(10_000)
            .and_then(|m| m.checked_add(digit))
            .ok_or("numeric value out of range")?;
    }

    // Value is mantissa * 10000^(weight - ndigits + 1); rescale to 10^-dscale.
    let shift = 4 * (weight - ndigits as i64 + 1) + i64::from(dscale);
    let factor = |exp: i64| -> Result<i128, BoxedError> {
        u32::try_from(exp)
            .ok()
            .and_then(|e| 10_i128.checked_pow(e))
            .ok_or_else(|| "numeric value out of range".into())
    };
    if shift >= 0 {
        mantissa = mantissa
            .checked_mul(factor(shift)?)
            .ok_or("numeric value out of range")?;
    } else {
        mantissa /= factor(-shift)?;
    }

    if sign == SIGN_NEGATIVE {
        mantissa = -mantissa;
    }
    Ok(Decimal::new(mantissa, dscale))
}

pub(crate) fn encode(value: Decimal, out: &mut BytesMut) -> Result<(), BoxedError> {
    let scale = value.scale();
    let dscale = u16::try_from(scale).map_err(|_| "numeric scale out of range")?;
    let sign = if value.mantissa() < 0 {
        SIGN_NEGATIVE
    } else {
        SIGN_POSITIVE
    };

    // Pad the fraction to whole base-10000 digits.
    let pad = (4 - scale % 4) % 4;
    let mut magnitude = value
        .mantissa()
        .unsigned_abs()
        .checked_mul(10_u128.pow(pad))
        .ok_or("numeric value out of range")?;
    let frac_digits = ((scale + pad) / 4) as i64;

    let mut digits: Vec<u16> = Vec::new();
    while magnitude > 0 {
        digits.push((magnitude % NBASE) as u16);
        magnitude /= NBASE;
    }
    digits.reverse();

    let weight = digits.len() as i64 - 1 - frac_digits;
    while digits.last() == Some(&0) {
        digits.pop();
    }

    let ndigits = i16::try_from(digits.len()).map_err(|_| "numeric value out of range")?;
    let weight = if digits.is_empty() {
        0
    } else {
        i16::try_from(weight).map_err(|_| "numeric value out of range")?
    };

    out.put_i16(ndigits);
    out.put_i16(weight);
    out.put_u16(if digits.is_empty() { SIGN_POSITIVE } else { sign });
    out.put_u16(dscale);
    for d in digits {
        out.put_u16(d);
    }
    Ok(())
}

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxedError> {
        decode(raw).map(PgNumeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(text: &str) -> Decimal {
        let value: Decimal = text.parse().unwrap();
        let mut buf = BytesMut::new();
        encode(value, &mut buf).unwrap();
        decode(&buf).unwrap()
    }

    #[test]
    fn encodes_known_layout() {
        // 12345.678 -> digits [1, 2345, 6780], weight 1, dscale 3
        let mut buf = BytesMut::new();
        encode("12345.678".parse().unwrap(), &mut buf).unwrap();
        assert_eq!(
            buf.as_ref(),
            &[0, 3, 0, 1, 0, 0, 0, 3, 0, 1, 0x09, 0x29, 0x1A, 0x7C]
        );
    }

    #[test]
    fn decodes_signs_scales_and_zero() {
        assert_eq!(round_trip("-0.05"), Decimal::new(-5, 2));
        assert_eq!(round_trip("100000000"), Decimal::new(100_000_000, 0));
        assert_eq!(round_trip("0.000"), Decimal::new(0, 3));
    }

    #[test]
    fn rejects_nan() {
        let raw = [0, 0, 0, 0, 0xC0, 0, 0, 0];
        assert!(decode(&raw).is_err());
    }
}
