//! Monetary amounts in the smallest currency unit.

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// Amount of money in cents.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl ValueObject for Money {}

// f64 represents every integer up to 2^53 exactly.
const MAX_EXACT_CENTS: f64 = 9_007_199_254_740_992.0;

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Convert a decimal amount (e.g. `12.5`) into cents.
    ///
    /// Returns `None` when the value is not finite or has sub-cent precision,
    /// since such an amount can never equal a stored price.
    pub fn from_decimal(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = value * 100.0;
        let rounded = scaled.round();
        if rounded.abs() > MAX_EXACT_CENTS || (scaled - rounded).abs() > 1e-6 {
            return None;
        }
        Some(Self(rounded as i64))
    }

    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl core::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_conversion_is_exact_for_cent_amounts() {
        assert_eq!(Money::from_decimal(12.5), Some(Money::from_cents(1250)));
        assert_eq!(Money::from_decimal(0.01), Some(Money::from_cents(1)));
        assert_eq!(Money::from_decimal(19.99), Some(Money::from_cents(1999)));
    }

    #[test]
    fn sub_cent_and_non_finite_values_are_rejected() {
        assert_eq!(Money::from_decimal(12.505), None);
        assert_eq!(Money::from_decimal(f64::NAN), None);
        assert_eq!(Money::from_decimal(f64::INFINITY), None);
    }

    #[test]
    fn display_uses_two_decimals() {
        assert_eq!(Money::from_cents(1250).to_string(), "12.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decimal_roundtrip_preserves_cents(cents in -10_000_000i64..10_000_000) {
                let money = Money::from_cents(cents);
                prop_assert_eq!(Money::from_decimal(money.as_decimal()), Some(money));
            }
        }
    }
}
