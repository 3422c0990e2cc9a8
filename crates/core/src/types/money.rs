//! Monetary helpers built on decimal arithmetic.
//!
//! Prices are plain [`Decimal`] values in the marketplace currency's standard
//! unit. Every computed discount amount goes through [`round_money`] so that
//! receipts, audit rows and totals agree to the cent.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept for monetary amounts.
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// Largest storable monetary amount, matching `NUMERIC(12, 2)` columns.
///
/// ```rust
/// use qreserve_core::MAX_MONEY;
/// use rust_decimal::Decimal;
///
/// assert_eq!(MAX_MONEY, Decimal::new(999_999_999_999, 2));
/// ```
pub const MAX_MONEY: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, MONEY_DECIMAL_PLACES);

/// Whether `amount` has at most two decimal places and fits a money column.
#[must_use]
pub fn is_storable_money(amount: Decimal) -> bool {
    amount.abs() <= MAX_MONEY && amount.normalize().scale() <= MONEY_DECIMAL_PLACES
}

/// Round a monetary amount to cents, half away from zero.
///
/// ```rust
/// use qreserve_core::round_money;
/// use rust_decimal::Decimal;
///
/// assert_eq!(round_money(Decimal::new(12_345, 3)), Decimal::new(1_235, 2));
/// ```
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(Decimal::new(5, 3)), Decimal::new(1, 2));
        assert_eq!(round_money(Decimal::new(4, 3)), Decimal::ZERO);
    }

    #[test]
    fn test_storable_money_limits() {
        assert!(is_storable_money(MAX_MONEY));
        assert!(is_storable_money(Decimal::new(10_500, 3)));
        assert!(!is_storable_money(Decimal::new(10_005, 3)));
        assert!(!is_storable_money(MAX_MONEY + Decimal::new(1, 2)));
    }

    #[test]
    fn test_round_money_keeps_whole_amounts() {
        assert_eq!(round_money(Decimal::from(20)), Decimal::from(20));
    }
}
