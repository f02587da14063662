use crate::domain::ports::Model;
use crate::error::{INVALID_VALUE, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Number of fractional units in one whole unit.
pub const FRAC_UNIT: i64 = 1_000_000_000;
/// Number of decimal places a coin may carry.
pub const MAX_SCALE: u32 = 9;
/// Largest absolute value of the whole part.
pub const MAX_WHOLE: i64 = 999_999_999_999_999;

/// A currency amount: whole and fractional units of a ticker.
///
/// Backed by `rust_decimal::Decimal` so that arithmetic stays exact. The value
/// is kept normalized, which makes equality and serialization independent of
/// the scale the amount was written with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawCoin")]
pub struct Coin {
    pub ticker: String,
    pub amount: Decimal,
}

/// Wire form of a [`Coin`] before normalization.
#[derive(Deserialize)]
struct RawCoin {
    ticker: String,
    amount: Decimal,
}

impl From<RawCoin> for Coin {
    fn from(raw: RawCoin) -> Self {
        Coin::new(raw.amount, raw.ticker)
    }
}

impl Coin {
    pub fn new(amount: Decimal, ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            amount: amount.normalize(),
        }
    }

    /// Builds a coin from its whole and fractional (10^-9) parts.
    pub fn from_parts(whole: i64, fractional: i64, ticker: impl Into<String>) -> Self {
        let units = i128::from(whole) * i128::from(FRAC_UNIT) + i128::from(fractional);
        Self::new(Decimal::from_i128_with_scale(units, MAX_SCALE), ticker)
    }

    pub fn zero(ticker: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, ticker)
    }

    pub fn whole(&self) -> i64 {
        self.amount.trunc().to_i64().unwrap_or(0)
    }

    pub fn fractional(&self) -> i64 {
        ((self.amount - self.amount.trunc()) * Decimal::from(FRAC_UNIT))
            .to_i64()
            .unwrap_or(0)
    }

    /// Value expressed in fractional units, saturating at the i64 range.
    pub fn to_units(&self) -> i64 {
        (self.amount * Decimal::from(FRAC_UNIT))
            .trunc()
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_non_negative(&self) -> bool {
        self.amount >= Decimal::ZERO
    }

    pub fn same_type(&self, other: &Coin) -> bool {
        self.ticker == other.ticker
    }

    /// Orders two coins of the same ticker.
    pub fn compare(&self, other: &Coin) -> Result<Ordering> {
        if !self.same_type(other) {
            return Err(self.mismatch(other));
        }
        Ok(self.amount.cmp(&other.amount))
    }

    pub fn checked_add(&self, other: &Coin) -> Result<Coin> {
        if !self.same_type(other) {
            return Err(self.mismatch(other));
        }
        let sum = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| INVALID_VALUE.new_error("coin overflow"))?;
        let coin = Coin::new(sum, self.ticker.clone());
        coin.check_range()?;
        Ok(coin)
    }

    pub fn checked_sub(&self, other: &Coin) -> Result<Coin> {
        self.checked_add(&Coin::new(-other.amount, other.ticker.clone()))
    }

    /// Checks ticker format, precision and range.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_ticker(&self.ticker) {
            return Err(INVALID_VALUE.new_error(format!("invalid ticker {:?}", self.ticker)));
        }
        if self.amount.normalize().scale() > MAX_SCALE {
            return Err(INVALID_VALUE.new_error(format!(
                "more than {MAX_SCALE} fractional digits"
            )));
        }
        self.check_range()
    }

    fn check_range(&self) -> Result<()> {
        if self.amount.abs() >= Decimal::from(MAX_WHOLE) + Decimal::ONE {
            return Err(INVALID_VALUE.new_error("coin value out of range"));
        }
        Ok(())
    }

    fn mismatch(&self, other: &Coin) -> crate::error::Error {
        INVALID_VALUE.new_error(format!(
            "mismatched currency {} and {}",
            self.ticker, other.ticker
        ))
    }
}

/// Stored balances must be valid and never negative.
impl Model for Coin {
    fn validate(&self) -> Result<()> {
        Coin::validate(self)?;
        if !self.is_non_negative() {
            return Err(INVALID_VALUE.new_error("negative balance"));
        }
        Ok(())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.ticker)
    }
}

pub fn is_valid_ticker(ticker: &str) -> bool {
    (3..=4).contains(&ticker.len()) && ticker.bytes().all(|b| b.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parts() {
        let coin = Coin::from_parts(12, 500_000_000, "IOV");
        assert_eq!(coin.amount, dec!(12.5));
        assert_eq!(coin.whole(), 12);
        assert_eq!(coin.fractional(), 500_000_000);
        assert_eq!(coin.to_units(), 12_500_000_000);
    }

    #[test]
    fn test_arithmetic() {
        let a = Coin::new(dec!(10.0), "IOV");
        let b = Coin::new(dec!(2.75), "IOV");
        assert_eq!(a.checked_add(&b).unwrap(), Coin::new(dec!(12.75), "IOV"));
        assert_eq!(a.checked_sub(&b).unwrap(), Coin::new(dec!(7.25), "IOV"));
        assert_eq!(a.compare(&b).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_mismatched_ticker() {
        let a = Coin::new(dec!(1), "IOV");
        let b = Coin::new(dec!(1), "ETH");
        assert!(a.checked_add(&b).unwrap_err().is(INVALID_VALUE));
        assert!(a.compare(&b).is_err());
    }

    #[test]
    fn test_validation() {
        assert!(Coin::new(dec!(1), "IOV").validate().is_ok());
        assert!(Coin::new(dec!(1), "io").validate().is_err());
        assert!(Coin::new(dec!(1), "TOOLONG").validate().is_err());
        assert!(Coin::new(dec!(0.0000000001), "IOV").validate().is_err());
        assert!(Coin::from_parts(MAX_WHOLE, 0, "IOV").validate().is_ok());
        assert!(Coin::from_parts(MAX_WHOLE + 1, 0, "IOV").validate().is_err());
    }

    #[test]
    fn test_balance_model_rejects_negative() {
        let coin = Coin::new(dec!(-1), "IOV");
        assert!(Coin::validate(&coin).is_ok());
        assert!(Model::validate(&coin).is_err());
    }

    #[test]
    fn test_normalized_equality() {
        assert_eq!(Coin::new(dec!(1.50), "IOV"), Coin::new(dec!(1.5), "IOV"));
    }

    #[test]
    fn test_deserialize_normalizes() {
        let coin: Coin = serde_json::from_str(r#"{"ticker":"IOV","amount":"40.000"}"#).unwrap();
        assert_eq!(coin.amount.scale(), 0);
        assert_eq!(coin, Coin::new(dec!(40), "IOV"));
        assert_eq!(
            serde_json::to_string(&coin).unwrap(),
            r#"{"ticker":"IOV","amount":"40"}"#
        );
    }
}
