//! User input conversion: decimal amounts and addresses.
//!
//! Users see amounts as decimal strings; contracts see integer base units.
//! Conversions here are exact string/U256 arithmetic. Floating point is only
//! used for market-reference values shown to the user.

use crate::error::{Result, WalletError};
use alloy::primitives::{Address, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Decimals of the native asset.
pub const NATIVE_DECIMALS: u8 = 18;

/// Seconds per year used for APR -> APY compounding.
pub const SECONDS_PER_YEAR: f64 = 31_536_000.0;

/// Decimals of a RAY (27-decimal fixed point) rate.
pub const RAY_DECIMALS: u8 = 27;

/// Pre-computed powers of 10 for fast decimal conversion
const POW10: [u128; 39] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
    10_000_000_000_000_000_000,
    100_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000_000_000_000_000,
];

/// Fast power of 10 lookup (up to 10^38)
#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    if exp < 39 {
        U256::from(POW10[exp as usize])
    } else {
        U256::from(10u64).pow(U256::from(exp))
    }
}

/// Convert a decimal string to integer base units.
///
/// Accepts `"12"`, `"12.5"`, `".5"` and `"12."`. Rejects signs, exponents,
/// and more fractional digits than `decimals`.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(WalletError::invalid_amount(amount, "empty amount"));
    }

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(WalletError::invalid_amount(amount, "no digits"));
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WalletError::invalid_amount(amount, "expected a non-negative decimal number"));
    }
    if frac_part.len() > decimals as usize {
        return Err(WalletError::invalid_amount(
            amount,
            format!("more than {decimals} fractional digits"),
        ));
    }

    let overflow = || WalletError::invalid_amount(amount, "amount does not fit in 256 bits");

    let int_value = if int_part.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(int_part, 10).map_err(|_| overflow())?
    };

    let padded = format!("{frac_part:0<width$}", width = decimals as usize);
    let frac_value = if padded.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(&padded, 10).map_err(|_| overflow())?
    };

    int_value
        .checked_mul(pow10(decimals))
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(overflow)
}

/// Parse a hex address (checksummed or not).
pub fn parse_address(address: &str) -> Result<Address> {
    address
        .trim()
        .parse::<Address>()
        .map_err(|_| WalletError::InvalidAddress(address.to_string()))
}

/// Format integer base units as a minimal decimal string.
///
/// Trailing fractional zeros are dropped: `1_500_000` at 6 decimals is `"1.5"`,
/// `2_000_000` is `"2"`.
pub fn format_amount(raw: U256, decimals: u8) -> String {
    let scale = pow10(decimals);
    let int_part = raw / scale;
    let frac_part = raw % scale;

    if frac_part.is_zero() {
        return int_part.to_string();
    }

    let frac = format!("{:0>width$}", frac_part.to_string(), width = decimals as usize);
    format!("{}.{}", int_part, frac.trim_end_matches('0'))
}

/// Convert base units to f64.
/// Use only for display values, not for amounts that get submitted.
pub fn to_f64(raw: U256, decimals: u8) -> f64 {
    format_amount(raw, decimals).parse().unwrap_or(f64::MAX)
}

/// Value of `amount` (token base units) in market reference currency units.
///
/// Formula: amount * price / 10^decimals, where `price` is quoted in
/// market reference units per whole token.
pub fn market_reference_value(amount: U256, price: U256, decimals: u8) -> U256 {
    if amount.is_zero() || price.is_zero() {
        return U256::ZERO;
    }
    amount.saturating_mul(price) / pow10(decimals)
}

/// Basis points as a fraction (8000 -> 0.8).
pub fn bps_to_f64(bps: u16) -> f64 {
    bps as f64 / BPS_DENOMINATOR as f64
}

/// Convert a RAY annual rate (APR) into APY with per-second compounding.
pub fn ray_rate_to_apy(rate_ray: U256) -> f64 {
    let apr = to_f64(rate_ray, RAY_DECIMALS);
    (1.0 + apr / SECONDS_PER_YEAR).powf(SECONDS_PER_YEAR) - 1.0
}

/// Round half away from zero at `digits` fractional digits.
///
/// Rounding works on the shortest decimal representation of `value`, so
/// `round(1.005, 2)` is `1.01` even though `1.005` is stored slightly below
/// that in binary. Values outside the decimal range are returned unchanged.
pub fn round(value: f64, digits: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .and_then(|d| {
            d.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero)
                .to_f64()
        })
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow10_lookup() {
        assert_eq!(pow10(0), U256::from(1u64));
        assert_eq!(pow10(6), U256::from(1_000_000u64));
        assert_eq!(pow10(18), U256::from(1_000_000_000_000_000_000u64));
        assert_eq!(pow10(40), pow10(20) * pow10(20));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1.5", 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(parse_amount("100", 6).unwrap(), U256::from(100_000_000u64));
        assert_eq!(parse_amount(".25", 2).unwrap(), U256::from(25u64));
        assert_eq!(parse_amount("3.", 2).unwrap(), U256::from(300u64));
        assert_eq!(parse_amount(" 0 ", 18).unwrap(), U256::ZERO);
        assert_eq!(
            parse_amount("0.000000000000000001", 18).unwrap(),
            U256::from(1u64)
        );
    }

    #[test]
    fn test_parse_amount_rejects_bad_input() {
        assert!(parse_amount("", 6).is_err());
        assert!(parse_amount(".", 6).is_err());
        assert!(parse_amount("-1", 6).is_err());
        assert!(parse_amount("1e6", 6).is_err());
        assert!(parse_amount("1.2.3", 6).is_err());
        assert!(parse_amount("0.1234567", 6).is_err());
        assert!(parse_amount("1.5", 0).is_err());
    }

    #[test]
    fn test_parse_address() {
        let address = parse_address("0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174").unwrap();
        assert_eq!(address, parse_address("0x2791bca1f2de4661ed88a30c99a7a9449aa84174").unwrap());
        assert!(matches!(parse_address("0x1234"), Err(WalletError::InvalidAddress(_))));
        assert!(parse_address("not an address").is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_amount(U256::from(2_000_000u64), 6), "2");
        assert_eq!(format_amount(U256::from(1u64), 6), "0.000001");
        assert_eq!(format_amount(U256::ZERO, 18), "0");
        assert_eq!(format_amount(U256::from(42u64), 0), "42");
    }

    #[test]
    fn test_amount_round_trip() {
        let cases = [("1.5", 6), ("0.000001", 6), ("123456789.123456789", 18), ("7", 0), ("0", 8)];
        for (amount, decimals) in cases {
            let raw = parse_amount(amount, decimals).unwrap();
            assert_eq!(format_amount(raw, decimals), amount, "decimals = {decimals}");
        }
    }

    #[test]
    fn test_market_reference_value() {
        // 1000 USDC (6 decimals) at 1.00 (8-decimal reference unit)
        let amount = U256::from(1_000_000_000u64);
        let price = U256::from(100_000_000u64);
        assert_eq!(market_reference_value(amount, price, 6), U256::from(100_000_000_000u64));

        // 1.5 ETH (18 decimals) at 2000.00
        let amount = U256::from(1_500_000_000_000_000_000u128);
        let price = U256::from(200_000_000_000u64);
        assert_eq!(to_f64(market_reference_value(amount, price, 18), 8), 3000.0);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round(1.005, 2), 1.01);
        assert_eq!(round(0.0, 2), 0.0);
        assert_eq!(round(-1.005, 2), -1.01);
        assert_eq!(round(2.344, 2), 2.34);
        assert_eq!(round(12.5, 0), 13.0);
        assert!(round(f64::NAN, 2).is_nan());
    }

    #[test]
    fn test_ray_rate_to_apy() {
        assert_eq!(ray_rate_to_apy(U256::ZERO), 0.0);

        // 5% APR compounds to ~5.127% APY
        let five_percent = pow10(25) * U256::from(5u64);
        let apy = ray_rate_to_apy(five_percent);
        assert!((apy - 0.05127).abs() < 1e-4);
    }
}
