//! Arbitrary-precision supply arithmetic.
//!
//! Raw amounts are integer base units that can exceed 2^53 (and any fixed
//! width), so they are parsed into `BigUint`, scaled down by `10^decimals`
//! with integer division (whole tokens, truncated) and combined as `BigInt`.
//! Conversion to `f64` happens only when a figure leaves this module.

use corelib::{LockingMode, TokenConfig, TokenDay};
use num_bigint::{BigInt, BigUint};
use num_traits::ToPrimitive;

use crate::error::AggregatorError;

pub fn parse_amount(raw: &str) -> Result<BigUint, AggregatorError> {
    raw.trim()
        .parse::<BigUint>()
        .map_err(|_| AggregatorError::InvalidAmount(raw.to_string()))
}

fn pow10(exp: u32) -> BigUint {
    BigUint::from(10u32).pow(exp)
}

/// `raw / 10^decimals`, truncated to whole tokens.
pub fn whole_units(raw: &BigUint, decimals: u32) -> BigInt {
    BigInt::from(raw / pow10(decimals))
}

/// Parse and scale a raw amount string to whole tokens.
pub fn parse_whole(raw: &str, decimals: u32) -> Result<BigInt, AggregatorError> {
    Ok(whole_units(&parse_amount(raw)?, decimals))
}

/// Token amount keeping two fractional digits (`raw / 10^(decimals-2) / 100`).
pub fn units_with_cents(raw: &BigUint, decimals: u32) -> Result<f64, AggregatorError> {
    let cents = if decimals >= 2 {
        raw / pow10(decimals - 2)
    } else {
        raw * pow10(2 - decimals)
    };
    cents
        .to_f64()
        .filter(|v| v.is_finite())
        .map(|v| v / 100.0)
        .ok_or_else(|| AggregatorError::ComputationFailure(format!("{cents} cents exceed f64")))
}

/// Lossy conversion at the module boundary; `None` when out of `f64` range.
pub fn to_float(v: &BigInt) -> Option<f64> {
    v.to_f64().filter(|f| f.is_finite())
}

/// Supply figures in whole tokens for one daily record.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SupplyFigures {
    pub total: BigInt,
    pub treasury: BigInt,
    pub total_locked: BigInt,
    /// Circulating excluding treasury only.
    pub circulating: BigInt,
    /// Circulating excluding treasury and locked neurons.
    pub real_circulating: BigInt,
}

/// Derive supply figures from a daily record. `fixed_lock` (whole tokens) is
/// removed from both total and locked supply.
pub fn derive_supply(
    day: &TokenDay,
    token: &TokenConfig,
    fixed_lock: i128,
) -> Result<SupplyFigures, AggregatorError> {
    let decimals = token.decimals;
    let fixed_lock = BigInt::from(fixed_lock);

    let total = parse_whole(&day.total_supply, decimals)? - &fixed_lock;

    let (treasury, total_locked) = match &day.locking {
        Some(l) => (
            parse_whole(&l.treasury, decimals)?,
            parse_whole(&l.total_locked, decimals)?,
        ),
        None => (BigInt::default(), BigInt::default()),
    };
    let total_locked = total_locked - &fixed_lock;

    let (circulating, real_circulating) = match token.locking {
        LockingMode::Reported => {
            let raw = day.circulating_supply.as_deref().ok_or_else(|| {
                AggregatorError::ComputationFailure(format!(
                    "{} reports circulating supply but the record has none",
                    token.symbol
                ))
            })?;
            let c = parse_whole(raw, decimals)?;
            (c.clone(), c)
        }
        LockingMode::Derived => {
            let circulating = &total - &treasury;
            let real = &circulating - &total_locked;
            (circulating, real)
        }
    };

    Ok(SupplyFigures {
        total,
        treasury,
        total_locked,
        circulating,
        real_circulating,
    })
}
