//! Base-unit to canonical decimal conversion for transaction values.
//!
//! Values arrive as unsigned base-unit quantities up to 256 bits wide, so
//! everything here is digit-string arithmetic. No native integer type is
//! involved and no quantity can overflow.

use crate::error::SyncError;

/// Parse a base-unit quantity given as a hex (`0x…`) or decimal string,
/// returning its decimal digit string without leading zeros.
pub fn parse_base_units(raw: &str) -> Result<String, SyncError> {
    let s = raw.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        hex_to_decimal(hex).map_err(|_| SyncError::Other(format!("bad hex quantity {raw:?}")))
    } else if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        let trimmed = s.trim_start_matches('0');
        Ok(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
    } else {
        Err(SyncError::Other(format!("bad decimal quantity {raw:?}")))
    }
}

/// Schoolbook base conversion: decimal digits little-endian, multiply by 16
/// and add each hex digit.
fn hex_to_decimal(hex: &str) -> Result<String, ()> {
    let mut digits: Vec<u8> = vec![0];
    for c in hex.chars() {
        let v = c.to_digit(16).ok_or(())?;
        let mut carry = v;
        for d in digits.iter_mut() {
            let x = u32::from(*d) * 16 + carry;
            *d = (x % 10) as u8;
            carry = x / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }
    while digits.len() > 1 && *digits.last().unwrap() == 0 {
        digits.pop();
    }
    Ok(digits.iter().rev().map(|d| char::from(b'0' + d)).collect())
}

/// Render a decimal digit string of base units with `decimals` precision.
///
/// Trailing zeros in the fraction are trimmed, but at least one fractional
/// digit is always kept, so one whole token renders as `"1.0"`.
pub fn format_base_units(digits: &str, decimals: u32) -> String {
    let decimals = decimals as usize;
    let trimmed = digits.trim_start_matches('0');
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };

    let (int, frac) = if trimmed.len() > decimals {
        let split = trimmed.len() - decimals;
        (&trimmed[..split], trimmed[split..].to_string())
    } else {
        ("0", format!("{trimmed:0>decimals$}"))
    };

    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        format!("{int}.0")
    } else {
        format!("{int}.{frac}")
    }
}

/// Convert a raw base-unit string to its canonical decimal representation.
pub fn to_decimal_string(raw: &str, decimals: u32) -> Result<String, SyncError> {
    Ok(format_base_units(&parse_base_units(raw)?, decimals))
}
