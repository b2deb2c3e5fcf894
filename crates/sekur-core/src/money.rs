//! # Minor-Unit Money Arithmetic
//!
//! Monetary amounts are `i64` minor currency units (e.g. centimes,
//! cents; for zero-decimal currencies such as GNF the unit is the franc
//! itself). Floating point is never used for money — fee percentages are
//! basis points and the fee split is exact integer arithmetic with
//! round-half-to-even at the minor-unit granularity.
//!
//! ## System Invariant
//!
//! [`FeePercent::split`] guarantees `fee + net == amount` exactly for
//! every valid amount and fee percentage. The net is derived by
//! subtraction from the rounded fee, so not a single minor unit is lost
//! or created.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A strictly positive monetary amount in minor currency units.
///
/// Constructed via [`MinorAmount::new`], which rejects zero and negative
/// values, so a held escrow always carries a meaningful amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MinorAmount(i64);

impl MinorAmount {
    /// Create an amount, rejecting zero and negative values.
    pub fn new(minor: i64) -> Result<Self, ValidationError> {
        if minor <= 0 {
            return Err(ValidationError::NonPositiveAmount(minor));
        }
        Ok(Self(minor))
    }

    /// The raw minor-unit value.
    pub fn get(&self) -> i64 {
        self.0
    }

    /// `self - other`, if the result is still positive.
    ///
    /// Used for split settlements: the remainder owed to the
    /// counterparty after a partial resolution. Returns `None` when
    /// `other >= self`.
    pub fn remainder_after(&self, other: MinorAmount) -> Option<MinorAmount> {
        let diff = self.0 - other.0;
        (diff > 0).then_some(Self(diff))
    }
}

impl<'de> Deserialize<'de> for MinorAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for MinorAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A platform fee percentage, stored as basis points in `[0, 10000)`.
///
/// `2.5%` is 250 basis points. Percentages with more than two decimal
/// places are rejected — fee policy is expressed in basis points or
/// coarser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FeePercent(u32);

impl FeePercent {
    /// One hundred percent, in basis points. Valid fees are strictly
    /// below this.
    pub const SCALE: u32 = 10_000;

    /// Create a fee from basis points. Must be `< 10000` (100%).
    pub fn from_bps(bps: u32) -> Result<Self, ValidationError> {
        if bps >= Self::SCALE {
            return Err(ValidationError::InvalidFeePercent(format!("{bps}bps")));
        }
        Ok(Self(bps))
    }

    /// Zero fee.
    pub fn zero() -> Self {
        Self(0)
    }

    /// The fee in basis points.
    pub fn as_bps(&self) -> u32 {
        self.0
    }

    /// Split an amount into platform fee and receiver net.
    ///
    /// The fee is `round(amount * percent / 100)` with round-half-to-even
    /// at minor-unit granularity; the net is the exact remainder, so
    /// `fee + net == amount` always holds.
    pub fn split(&self, amount: MinorAmount) -> FeeSplit {
        // i128 product: i64::MAX * 9999 does not fit in i64.
        let product = amount.get() as i128 * self.0 as i128;
        let scale = Self::SCALE as i128;
        let quotient = product / scale;
        let remainder = product % scale;

        let fee = match (remainder * 2).cmp(&scale) {
            std::cmp::Ordering::Less => quotient,
            std::cmp::Ordering::Greater => quotient + 1,
            // Exactly half a minor unit: round to even.
            std::cmp::Ordering::Equal => {
                if quotient % 2 == 0 {
                    quotient
                } else {
                    quotient + 1
                }
            }
        } as i64;

        FeeSplit {
            fee,
            net: amount.get() - fee,
        }
    }
}

impl std::str::FromStr for FeePercent {
    type Err = ValidationError;

    /// Parse a decimal percentage such as `"2.5"`, `"0"`, or `"12.75"`.
    /// At most two decimal places; range `[0, 100)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidFeePercent(s.to_string());

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || whole.len() > 3 || frac.len() > 2 {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        // "2.5" means 50 hundredths, not 5.
        let frac_hundredths: u32 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u32>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };

        Self::from_bps(whole * 100 + frac_hundredths)
    }
}

impl std::fmt::Display for FeePercent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{whole}")
        } else if frac % 10 == 0 {
            write!(f, "{whole}.{}", frac / 10)
        } else {
            write!(f, "{whole}.{frac:02}")
        }
    }
}

impl<'de> Deserialize<'de> for FeePercent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The result of applying a [`FeePercent`] to an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    /// Platform fee in minor units.
    pub fee: i64,
    /// Amount payable to the receiver in minor units.
    pub net: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn amount(v: i64) -> MinorAmount {
        MinorAmount::new(v).unwrap()
    }

    #[test]
    fn minor_amount_rejects_non_positive() {
        assert!(MinorAmount::new(0).is_err());
        assert!(MinorAmount::new(-5).is_err());
        assert!(MinorAmount::new(1).is_ok());
    }

    #[test]
    fn minor_amount_deserialize_rejects_negative() {
        let result: Result<MinorAmount, _> = serde_json::from_str("-5");
        assert!(result.is_err());
        let ok: MinorAmount = serde_json::from_str("10000").unwrap();
        assert_eq!(ok.get(), 10_000);
    }

    #[test]
    fn remainder_after_partial() {
        let full = amount(10_000);
        let part = amount(5_000);
        assert_eq!(full.remainder_after(part), Some(amount(5_000)));
        assert_eq!(full.remainder_after(full), None);
        assert_eq!(part.remainder_after(full), None);
    }

    #[test]
    fn fee_percent_parses_decimals() {
        assert_eq!("2.5".parse::<FeePercent>().unwrap().as_bps(), 250);
        assert_eq!("0".parse::<FeePercent>().unwrap().as_bps(), 0);
        assert_eq!("12.75".parse::<FeePercent>().unwrap().as_bps(), 1275);
        assert_eq!("99.99".parse::<FeePercent>().unwrap().as_bps(), 9999);
    }

    #[test]
    fn fee_percent_rejects_out_of_range() {
        assert!("100".parse::<FeePercent>().is_err());
        assert!("100.0".parse::<FeePercent>().is_err());
        assert!("-1".parse::<FeePercent>().is_err());
        assert!("2.555".parse::<FeePercent>().is_err());
        assert!("abc".parse::<FeePercent>().is_err());
        assert!("".parse::<FeePercent>().is_err());
        assert!(".5".parse::<FeePercent>().is_err());
    }

    #[test]
    fn fee_percent_display_roundtrip() {
        for raw in ["0", "1", "2.5", "12.75", "99.99"] {
            let fee: FeePercent = raw.parse().unwrap();
            assert_eq!(fee.to_string(), raw);
        }
    }

    #[test]
    fn split_scenario_gnf() {
        // 10000 GNF at 2.5% → fee 250, net 9750.
        let split = "2.5".parse::<FeePercent>().unwrap().split(amount(10_000));
        assert_eq!(split.fee, 250);
        assert_eq!(split.net, 9_750);
    }

    #[test]
    fn split_zero_fee() {
        let split = FeePercent::zero().split(amount(10_000));
        assert_eq!(split.fee, 0);
        assert_eq!(split.net, 10_000);
    }

    #[test]
    fn split_rounds_half_to_even() {
        // 25 * 2% = 0.5 → rounds to 0 (even).
        let two_pct: FeePercent = "2".parse().unwrap();
        assert_eq!(two_pct.split(amount(25)).fee, 0);
        // 75 * 2% = 1.5 → rounds to 2 (even).
        assert_eq!(two_pct.split(amount(75)).fee, 2);
        // 125 * 2% = 2.5 → rounds to 2 (even).
        assert_eq!(two_pct.split(amount(125)).fee, 2);
    }

    #[test]
    fn split_rounds_ordinary_cases() {
        let fee: FeePercent = "1".parse().unwrap();
        // 149 * 1% = 1.49 → 1
        assert_eq!(fee.split(amount(149)).fee, 1);
        // 151 * 1% = 1.51 → 2
        assert_eq!(fee.split(amount(151)).fee, 2);
    }

    #[test]
    fn split_large_amount_no_overflow() {
        let fee: FeePercent = "99.99".parse().unwrap();
        let split = fee.split(amount(i64::MAX));
        assert_eq!(split.fee + split.net, i64::MAX);
        assert!(split.net > 0);
    }

    proptest! {
        /// For every valid amount and fee, the split conserves the
        /// amount exactly and the fee is within bounds.
        #[test]
        fn split_conserves_amount(minor in 1i64..=i64::MAX, bps in 0u32..10_000) {
            let fee = FeePercent::from_bps(bps).unwrap();
            let split = fee.split(MinorAmount::new(minor).unwrap());
            prop_assert_eq!(split.fee + split.net, minor);
            prop_assert!(split.fee >= 0);
            prop_assert!(split.net >= 0);
            // Fee never exceeds the exact proportion rounded up.
            let exact = minor as i128 * bps as i128;
            prop_assert!((split.fee as i128) * 10_000 <= exact + 5_000);
        }
    }
}
