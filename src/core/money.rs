//! Money helpers over `rust_decimal`
//!
//! Amounts are exact decimals with at most two fractional digits (centavos).

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::core::error::{FynnessError, FynnessResult};

/// Number of fractional digits kept for BRL amounts
pub const CENT_SCALE: u32 = 2;

/// Check that `amount` is strictly positive and has at most two decimals
pub fn positive_amount(field: &str, amount: Decimal) -> FynnessResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(FynnessError::field(
            field,
            format!("must be greater than zero (got {})", amount),
        ));
    }
    cents_precision(field, amount)
}

/// Check that `amount` has at most two decimals and normalize its scale
pub fn cents_precision(field: &str, amount: Decimal) -> FynnessResult<Decimal> {
    if amount.normalize().scale() > CENT_SCALE {
        return Err(FynnessError::field(
            field,
            format!("must have at most {} decimal places (got {})", CENT_SCALE, amount),
        ));
    }
    Ok(amount.round_dp(CENT_SCALE))
}

/// Split `total` into `count` parts without losing or gaining a cent
///
/// Every part gets the truncated quotient; the remainder cents all go to the
/// final part.
pub fn split_evenly(total: Decimal, count: u32) -> FynnessResult<Vec<Decimal>> {
    if count == 0 {
        return Err(FynnessError::field("count", "must be at least 1"));
    }
    let cents = (total * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or_else(|| FynnessError::field("amount", "amount out of range"))?;
    let count_i = i64::from(count);
    if cents < count_i {
        return Err(FynnessError::field(
            "amount",
            format!("{} cannot be split into {} installments of at least R$0.01", total, count),
        ));
    }

    let base = cents / count_i;
    let remainder = cents % count_i;

    Ok((0..count_i)
        .map(|i| {
            let part = if i == count_i - 1 { base + remainder } else { base };
            Decimal::new(part, CENT_SCALE)
        })
        .collect())
}

/// Whether a stored aggregate has drifted beyond `tolerance` from its recomputed value
pub fn drifted(stored: Decimal, computed: Decimal, tolerance: Decimal) -> bool {
    (stored - computed).abs() > tolerance
}

/// Sum an iterator of amounts
pub fn sum<I: IntoIterator<Item = Decimal>>(amounts: I) -> Decimal {
    amounts.into_iter().fold(Decimal::ZERO, |acc, v| acc + v)
}
