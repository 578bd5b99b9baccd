use ethers_core::{
    types::U256,
    utils::{self, ConversionError},
};

use crate::{GsnError, Result};

fn invalid(value: &str) -> GsnError {
    GsnError::InvalidArgument(format!("invalid token amount: {:?}", value))
}

fn conversion(e: ConversionError) -> GsnError {
    GsnError::InvalidArgument(e.to_string())
}

/// Parse a human-readable amount like `"1.5"` into base units of a token with
/// `decimals` decimals. Rejects more fractional digits than `decimals`.
pub fn parse_units(value: &str, decimals: u32) -> Result<U256> {
    let value = value.trim();
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty())
        || !all_digits(whole)
        || !all_digits(fraction)
        || fraction.len() > decimals as usize
    {
        return Err(invalid(value));
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let normalized = if fraction.is_empty() {
        whole.to_owned()
    } else {
        format!("{}.{}", whole, fraction)
    };
    Ok(utils::parse_units(normalized, decimals).map_err(conversion)?.into())
}

/// Base units to a float, for display only
pub fn balance_to_f64(value: U256, decimals: u32) -> Result<f64> {
    let formatted = utils::format_units(value, decimals).map_err(conversion)?;
    formatted.parse().map_err(|_| invalid(&formatted))
}
