//! Conversion between display amounts (SHIC) and integer minor units.
//!
//! All arithmetic inside the wallet happens on `u64` minor units. User
//! input enters through [`parse_amount`] as decimal text and never as a
//! float, so an amount either converts exactly or is rejected.

use crate::error::ShicError;
use crate::network::COIN;

/// Minor units as a display float. Lossy above 2^53 units.
pub fn to_display(minor: u64) -> f64 {
    minor as f64 / COIN as f64
}

/// Exact decimal parse of a display string such as `"0.5"` or `"12"`.
pub fn parse_amount(text: &str) -> Result<u64, ShicError> {
    let text = text.trim();
    let err = || ShicError::AmountPrecision(text.to_string());

    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(err());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(err());
    }
    if frac.len() > 8 {
        return Err(err());
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| err())?
    };
    let frac: u64 = format!("{frac:0<8}").parse().map_err(|_| err())?;

    whole
        .checked_mul(COIN)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(err)
}

/// Render minor units with all eight decimals, e.g. `0.40000000`.
pub fn format_amount(minor: u64) -> String {
    format!("{}.{:08}", minor / COIN, minor % COIN)
}
