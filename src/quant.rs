// Amount arithmetic module
// This file handles parsing of base-unit amounts, conversion between base and
// display units, and overflow-free comparisons across decimal bases
//
// Numan Thabit 2025 Nov

use alloy_primitives::{Uint, U256};
use anyhow::{ensure, Result};
use std::cmp::Ordering;

use crate::errors::CallerInputError;

/// Wide enough for a U256 amount scaled by 10^255 and a further U256 factor.
pub type Wide = Uint<2048, 32>;

pub fn wide(value: U256) -> Wide {
    Wide::from_limbs_slice(value.as_limbs())
}

/// Back to 256 bits; `None` when the value does not fit.
pub fn narrow(value: Wide) -> Option<U256> {
    let limbs = value.as_limbs();
    if limbs[4..].iter().any(|l| *l != 0) {
        return None;
    }
    Some(U256::from_limbs_slice(&limbs[..4]))
}

pub fn pow10(decimals: u8) -> Wide {
    Wide::from(10u64).pow(Wide::from(decimals as u64))
}

/// Parse a caller-supplied base-unit amount. Only positive decimal integers
/// that fit in 256 bits are accepted.
pub fn parse_amount(raw: &str) -> Result<U256, CallerInputError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(CallerInputError::InvalidAmount("empty".into()));
    }
    if s.starts_with('-') {
        return Err(CallerInputError::InvalidAmount(format!("{s} is negative")));
    }
    let digits = s.strip_prefix('+').unwrap_or(s);
    if !digits.chars().all(|c| c.is_ascii_digit()) || digits.is_empty() {
        return Err(CallerInputError::InvalidAmount(format!(
            "{s} is not a base-unit integer"
        )));
    }
    let amount = U256::from_str_radix(digits, 10)
        .map_err(|_| CallerInputError::InvalidAmount(format!("{s} exceeds 256 bits")))?;
    if amount.is_zero() {
        return Err(CallerInputError::InvalidAmount("amount must be positive".into()));
    }
    Ok(amount)
}

/// Convert a display-unit decimal string ("1250.75") to base units.
pub fn parse_units(display: &str, decimals: u8) -> Result<U256> {
    let s = display.trim();
    ensure!(!s.is_empty(), "empty amount");
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    ensure!(
        int_part.chars().all(|c| c.is_ascii_digit())
            && frac_part.chars().all(|c| c.is_ascii_digit())
            && !(int_part.is_empty() && frac_part.is_empty()),
        "{s} is not a non-negative decimal"
    );
    ensure!(
        frac_part.len() <= decimals as usize,
        "{s} has more than {decimals} fractional digits"
    );
    let mut digits = String::with_capacity(int_part.len() + decimals as usize);
    digits.push_str(int_part);
    digits.push_str(frac_part);
    for _ in frac_part.len()..decimals as usize {
        digits.push('0');
    }
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).map_err(|_| anyhow::anyhow!("{s} overflows 256 bits"))
}

/// Render base units as a display-unit decimal string without losing precision.
pub fn format_units(amount: U256, decimals: u8) -> String {
    let raw = amount.to_string();
    let d = decimals as usize;
    if d == 0 {
        return raw;
    }
    let padded = if raw.len() <= d {
        format!("{}{}", "0".repeat(d - raw.len() + 1), raw)
    } else {
        raw
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - d);
    let frac = frac_part.trim_end_matches('0');
    if frac.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac}")
    }
}

/// Lossy display value, for logging and informational prices only.
pub fn to_display_f64(amount: U256, decimals: u8) -> f64 {
    let v: f64 = amount.to_string().parse().unwrap_or(f64::MAX);
    v / 10f64.powi(decimals as i32)
}

/// Compare a/b against c/d exactly (b and d non-zero).
pub fn cmp_ratio(a: U256, b: U256, c: U256, d: U256) -> Ordering {
    (wide(a) * wide(d)).cmp(&(wide(c) * wide(b)))
}

/// Whether `amount` (base units) exceeds `threshold` whole display units.
pub fn exceeds_display(amount: U256, decimals: u8, threshold: u64) -> bool {
    wide(amount) > Wide::from(threshold) * pow10(decimals)
}
