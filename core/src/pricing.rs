//! Decimal line pricing.
//!
//! Tax is rounded to 2 places per line, half away from zero, before any
//! summing. Order totals are the sum of already-rounded line values.

use crate::error::{EngineError, EngineResult};
use crate::types::OrderTotals;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Round a money amount to 2 decimal places, half away from zero.
#[must_use]
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Money breakdown of one order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePrice {
    /// `unit_price × quantity`
    pub subtotal: Decimal,
    /// `round2(subtotal × vat_rate)`
    pub tax: Decimal,
    /// `round2(subtotal + tax)`
    pub total: Decimal,
}

/// Price one line.
#[must_use]
pub fn price_line(unit_price: Decimal, quantity: i32, vat_rate: Decimal) -> LinePrice {
    let subtotal = unit_price * Decimal::from(quantity);
    let tax = round2(subtotal * vat_rate);
    LinePrice {
        subtotal,
        tax,
        total: round2(subtotal + tax),
    }
}

/// Sum priced lines into order totals.
#[must_use]
pub fn sum_lines<'a>(lines: impl IntoIterator<Item = &'a LinePrice>) -> OrderTotals {
    lines.into_iter().fold(
        OrderTotals {
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::ZERO,
        },
        |acc, line| OrderTotals {
            subtotal: acc.subtotal + line.subtotal,
            tax: acc.tax + line.tax,
            total: acc.total + line.total,
        },
    )
}

/// Convert an amount to minor units (cents), rounding half away from zero.
///
/// # Errors
///
/// Returns [`EngineError::Invariant`] if the amount does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> EngineResult<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| EngineError::Invariant(format!("Amount {amount} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap_or_default()
    }

    #[test]
    fn line_tax_is_rounded_before_total() {
        let line = price_line(dec("99.99"), 3, dec("0.23"));
        assert_eq!(line.subtotal, dec("299.97"));
        assert_eq!(line.tax, dec("68.99"));
        assert_eq!(line.total, dec("368.96"));
    }

    #[test]
    fn midpoint_rounds_away_from_zero() {
        // 1.50 × 0.23 = 0.345
        assert_eq!(price_line(dec("1.50"), 1, dec("0.23")).tax, dec("0.35"));
        assert_eq!(round2(dec("-0.345")), dec("-0.35"));
    }

    #[test]
    fn totals_sum_rounded_lines() {
        let lines = [
            price_line(dec("1.50"), 1, dec("0.23")),
            price_line(dec("1.50"), 1, dec("0.23")),
        ];
        let totals = sum_lines(&lines);
        // two rounded taxes of 0.35, not round2(0.69)
        assert_eq!(totals.tax, dec("0.70"));
        assert_eq!(totals.subtotal, dec("3.00"));
        assert_eq!(totals.total, dec("3.70"));
    }

    #[test]
    fn minor_units() {
        assert_eq!(to_minor_units(dec("368.96")).ok(), Some(36896));
        assert_eq!(to_minor_units(dec("0.005")).ok(), Some(1));
    }
}
