//! Parsing of hex and decimal quantities used by fixture files

use crate::U256;
use thiserror::Error;

/// Quantity parsing error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Not a valid hex or decimal number
    #[error("invalid quantity: {0}")]
    Invalid(String),
    /// Value does not fit the target width
    #[error("quantity out of range: {0}")]
    Overflow(String),
}

/// Parse a 256-bit quantity: `0x`-prefixed hex or plain decimal.
pub fn parse_u256(s: &str) -> Result<U256, QuantityError> {
    let s = s.trim();
    if let Some(hex_digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex_digits.is_empty() {
            return Ok(U256::zero());
        }
        if hex_digits.len() > 64 {
            return Err(QuantityError::Overflow(s.to_string()));
        }
        U256::from_str_radix(hex_digits, 16).map_err(|_| QuantityError::Invalid(s.to_string()))
    } else {
        U256::from_dec_str(s).map_err(|_| QuantityError::Invalid(s.to_string()))
    }
}

/// Parse a quantity that must fit in 64 bits.
pub fn parse_u64(s: &str) -> Result<u64, QuantityError> {
    let value = parse_u256(s)?;
    if value > U256::from(u64::MAX) {
        return Err(QuantityError::Overflow(s.to_string()));
    }
    Ok(value.low_u64())
}

/// Decode a hex byte string; `""` and `"0x"` are empty.
pub fn parse_bytes(s: &str) -> Result<Vec<u8>, QuantityError> {
    let s = s.trim();
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| QuantityError::Invalid(format!("{s}: {e}")))
}
