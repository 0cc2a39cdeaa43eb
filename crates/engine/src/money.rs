//! Conversions between the engine's `Decimal` arithmetic and the scaled
//! integer columns the database stores.
//!
//! All intermediate sums run at full `Decimal` precision; rounding to two
//! decimals happens exactly once, at the stored/returned figure. Columns keep
//! integer minor units to avoid floating-point drift in SQL aggregates:
//!
//! - amounts: cents (scale 2)
//! - quantities: thousandths (scale 3)
//! - rates: ten-thousandths (scale 4)

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::EngineError;

/// Rounds a monetary figure to two decimals, half away from zero.
#[must_use]
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts an amount to integer cents for storage.
pub fn amount_to_minor(value: Decimal) -> Result<i64, EngineError> {
    scaled(value, 2)
}

/// Reads integer cents back into a two-decimal amount.
#[must_use]
pub fn amount_from_minor(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Converts a quantity to integer thousandths for storage.
pub fn quantity_to_milli(value: Decimal) -> Result<i64, EngineError> {
    scaled(value, 3)
}

/// Reads integer thousandths back into a three-decimal quantity.
#[must_use]
pub fn quantity_from_milli(milli: i64) -> Decimal {
    Decimal::new(milli, 3)
}

/// Converts a rate (e.g. a discount fraction) to ten-thousandths for storage.
pub fn rate_to_scaled(value: Decimal) -> Result<i64, EngineError> {
    scaled(value, 4)
}

/// Reads stored ten-thousandths back into a four-decimal rate.
#[must_use]
pub fn rate_from_scaled(raw: i64) -> Decimal {
    Decimal::new(raw, 4)
}

fn scaled(value: Decimal, dp: u32) -> Result<i64, EngineError> {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    let factor = Decimal::from(10i64.pow(dp));
    rounded
        .checked_mul(factor)
        .and_then(|v| v.to_i64())
        .ok_or_else(|| EngineError::InvalidAmount(format!("value out of range: {value}")))
}
