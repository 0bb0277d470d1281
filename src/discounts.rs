//! Discount utilities
//!
//! Shared percentage arithmetic for every derived peso amount (loyalty
//! discount, tax). Each derived amount is rounded independently with
//! round-half-up; callers never re-derive one rounded amount from another.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use thiserror::Error;

/// Errors specific to discount calculations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscountError {
    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,
}

/// Build a [`Percentage`] from whole percent points (13 → 13%).
///
/// Rates are configured as whole points, so the conversion goes through
/// [`Decimal`] rather than floating point.
pub fn percent_points(points: u8) -> Percentage {
    Percentage::from(Decimal::new(i64::from(points), 2))
}

/// Calculate a percentage of a whole-peso amount, rounded half-up.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the calculation overflows
/// or the result cannot be represented as a peso amount.
pub fn percent_of(percent: &Percentage, amount: u64) -> Result<u64, DiscountError> {
    let amount = Decimal::from_u64(amount).ok_or(DiscountError::PercentConversion)?;

    ((*percent) * Decimal::ONE) // decimal_percentage crate doesn't actually expose the underlying Decimal
        .checked_mul(amount)
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or(DiscountError::PercentConversion)
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use testresult::TestResult;

    use super::*;

    #[test]
    fn percent_of_rounds_half_up() -> TestResult {
        // 13% of 1932 = 251.16 → 251
        assert_eq!(percent_of(&percent_points(13), 1932)?, 251);

        // 10% of 2147 = 214.7 → 215
        assert_eq!(percent_of(&percent_points(10), 2147)?, 215);

        // 5% of 1930 = 96.5 → 97 (midpoint rounds away from zero)
        assert_eq!(percent_of(&percent_points(5), 1930)?, 97);

        Ok(())
    }

    #[test]
    fn percent_of_zero_amount_is_zero() -> TestResult {
        assert_eq!(percent_of(&percent_points(15), 0)?, 0);

        Ok(())
    }

    #[test]
    fn percent_of_full_rate_is_identity() -> TestResult {
        assert_eq!(percent_of(&percent_points(100), 2500)?, 2500);

        Ok(())
    }

    #[test]
    fn percent_of_overflow_returns_error() -> TestResult {
        // Representable as a Decimal, but multiplying by a large amount
        // overflows the Decimal range.
        let percent = Percentage::try_from("100000000000000000000")?;
        let result = percent_of(&percent, u64::MAX);

        assert!(matches!(result, Err(DiscountError::PercentConversion)));

        Ok(())
    }

    #[test]
    fn percent_points_builds_exact_rates() -> TestResult {
        // 2% of 100 must be exactly 2, with no binary-float drift.
        assert_eq!(percent_of(&percent_points(2), 100)?, 2);
        assert_eq!(percent_of(&percent_points(15), 1000)?, 150);

        Ok(())
    }
}
