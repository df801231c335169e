//! Fixed-point monetary type for bids and budgets.
//!
//! All amounts use fixed-point arithmetic with 4 decimal places so that the
//! 0.05 / 0.10 / 0.20 / 0.25 increment tiers compare exactly.

use crate::ids::AMOUNT_SCALE;
use derive_more::{Add, AddAssign, From, Into, Sub, SubAssign, Sum};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point amount in the auction's currency unit.
///
/// # Examples
/// - `Amount(10000)` = 1.00
/// - `Amount(22000)` = 2.20
/// - `Amount(500)` = 0.05
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Add,
    Sub,
    AddAssign,
    SubAssign,
    Sum,
    From,
    Into,
)]
pub struct Amount(pub i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Create an Amount from a floating-point value.
    ///
    /// Non-finite input maps to zero so it fails the positivity check.
    #[inline]
    pub fn from_float(v: f64) -> Self {
        if !v.is_finite() {
            return Self::ZERO;
        }
        Self((v * AMOUNT_SCALE as f64).round() as i64)
    }

    /// Convert to floating-point for display and the wire.
    #[inline]
    pub fn to_float(self) -> f64 {
        self.0 as f64 / AMOUNT_SCALE as f64
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Whole units (e.g. `Amount::units(2)` = 2.00).
    #[inline]
    pub const fn units(n: i64) -> Self {
        Self(n * AMOUNT_SCALE)
    }

    /// Hundredths of a unit (e.g. `Amount::cents(5)` = 0.05).
    #[inline]
    pub const fn cents(n: i64) -> Self {
        Self(n * AMOUNT_SCALE / 100)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({:.2})", self.to_float())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_float())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_conversion() {
        assert_eq!(Amount::from_float(2.2), Amount(22_000));
        assert_eq!(Amount::from_float(0.05), Amount::cents(5));
        assert_eq!(Amount::units(3).to_float(), 3.0);
    }

    #[test]
    fn test_non_finite_is_zero() {
        assert_eq!(Amount::from_float(f64::NAN), Amount::ZERO);
        assert_eq!(Amount::from_float(f64::INFINITY), Amount::ZERO);
        assert!(!Amount::from_float(-1.0).is_positive());
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::from_float(2.15).to_string(), "2.15");
    }
}
