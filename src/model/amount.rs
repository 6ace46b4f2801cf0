//! Amount type for handling monetary values at 2-decimal precision.
//!
//! This module provides the `Amount` type which wraps `Decimal`. Every `Amount` is rounded to two
//! decimal places when it is created, so stored and compared values never carry more precision
//! than the ledger keeps.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Rounds `value` to two decimal places, with midpoints rounded toward positive infinity.
///
/// This is the rule the stored ledger documents were written with: `2.345` becomes `2.35` and
/// `-2.345` becomes `-2.34`.
pub fn round2(value: Decimal) -> Decimal {
    let strategy = if value.is_sign_negative() {
        RoundingStrategy::MidpointTowardZero
    } else {
        RoundingStrategy::MidpointAwayFromZero
    };
    value.round_dp_with_strategy(2, strategy)
}

/// Parsed amounts must be smaller than this in magnitude.
fn limit() -> Decimal {
    Decimal::from(1_000_000_000_000_000_i64)
}

/// Represents a monetary amount.
///
/// # Examples
///
/// ```
/// # use ledger_sync::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("1,000.505").unwrap();
/// assert_eq!(amount.to_string(), "1,000.51");
/// ```
///
/// Amounts serialize as JSON numbers:
/// ```
/// # use ledger_sync::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("12.50").unwrap();
/// assert_eq!(serde_json::to_string(&amount).unwrap(), "12.5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    pub const ZERO: Amount = Amount {
        value: Decimal::ZERO,
    };

    /// Creates a new Amount from a Decimal value, rounding it to two decimal places.
    pub fn new(value: Decimal) -> Self {
        Self {
            value: round2(value),
        }
    }

    /// Creates an amount from a whole number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Self::new(Decimal::new(cents, 2))
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value().is_zero()
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value().is_sign_negative()
    }

    /// Accepts `value` if it is within the range the ledger keeps.
    fn bounded(value: Decimal) -> Result<Self, AmountError> {
        if value.abs() >= limit() {
            return Err(AmountError::OutOfRange(value));
        }
        Ok(Amount::new(value))
    }
}

/// An error that can occur when parsing strings or numbers into `Amount` values.
pub enum AmountError {
    Invalid(rust_decimal::Error),
    OutOfRange(Decimal),
}

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Invalid(e) => Debug::fmt(e, f),
            AmountError::OutOfRange(v) => write!(f, "OutOfRange({v})"),
        }
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Invalid(e) => Display::fmt(e, f),
            AmountError::OutOfRange(v) => {
                write!(f, "{v} is too large, amounts must be less than {}", limit())
            }
        }
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AmountError::Invalid(e) => Some(e),
            AmountError::OutOfRange(_) => None,
        }
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// Parses plain decimals as well as values written with a leading `$` and `,` thousands
    /// separators. An empty string is zero. Values of a quadrillion or more are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        let without_dollar = if let Some(after_minus) = trimmed.strip_prefix('-') {
            match after_minus.strip_prefix('$') {
                Some(after_dollar) => format!("-{after_dollar}"),
                None => trimmed.to_string(),
            }
        } else {
            trimmed.strip_prefix('$').unwrap_or(trimmed).to_string()
        };

        let without_commas = without_dollar.replace(',', "");
        let value = Decimal::from_str(&without_commas).map_err(AmountError::Invalid)?;
        Amount::bounded(value)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (sign, num) = if self.is_negative() {
            ("-", self.value().abs())
        } else {
            ("", self.value())
        };
        write!(
            f,
            "{sign}{}",
            format_num::format_num!(",.2", num.to_f64().unwrap_or_default())
        )
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Whole amounts are written as integers, matching documents written by hand.
        if self.value.fract().is_zero() {
            if let Some(i) = self.value.to_i64() {
                return serializer.serialize_i64(i);
            }
        }
        serializer.serialize_f64(self.value.to_f64().unwrap_or_default())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Amount::bounded(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Amount::bounded(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        // The shortest round-trip text of the float is what the writer meant, e.g. `0.1`.
        Amount::from_str(&v.to_string()).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        Amount::from_str(v).map_err(E::custom)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Amount, E> {
        Ok(Amount::ZERO)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(dec("2.345")), dec("2.35"));
        assert_eq!(round2(dec("2.344")), dec("2.34"));
        assert_eq!(round2(dec("1.005")), dec("1.01"));
    }

    #[test]
    fn test_round2_negative_midpoint_goes_up() {
        assert_eq!(round2(dec("-2.345")), dec("-2.34"));
        assert_eq!(round2(dec("-2.346")), dec("-2.35"));
    }

    #[test]
    fn test_new_rounds() {
        let amount = Amount::new(dec("10.129"));
        assert_eq!(amount.value(), dec("10.13"));
    }

    #[test]
    fn test_parse_plain() {
        let amount = Amount::from_str("50.00").unwrap();
        assert_eq!(amount.value(), dec("50"));
    }

    #[test]
    fn test_parse_with_dollar_and_commas() {
        let amount = Amount::from_str("-$1,234,567.89").unwrap();
        assert_eq!(amount.value(), dec("-1234567.89"));
    }

    #[test]
    fn test_parse_empty_string() {
        let amount = Amount::from_str("  ").unwrap();
        assert!(amount.is_zero());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(Amount::from_str("twelve").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::from_cents(123456).to_string(), "1,234.56");
        assert_eq!(Amount::from_cents(-5000).to_string(), "-50.00");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_serialize_whole_as_integer() {
        let json = serde_json::to_string(&Amount::from_cents(100000)).unwrap();
        assert_eq!(json, "1000");
    }

    #[test]
    fn test_serialize_fraction() {
        let json = serde_json::to_string(&Amount::from_cents(1999)).unwrap();
        assert_eq!(json, "19.99");
    }

    #[test]
    fn test_deserialize_float() {
        let amount: Amount = serde_json::from_str("0.1").unwrap();
        assert_eq!(amount.value(), dec("0.1"));
    }

    #[test]
    fn test_deserialize_float_rounds() {
        let amount: Amount = serde_json::from_str("33.333333").unwrap();
        assert_eq!(amount.value(), dec("33.33"));
    }

    #[test]
    fn test_deserialize_integer_and_string() {
        let a: Amount = serde_json::from_str("250").unwrap();
        let b: Amount = serde_json::from_str("\"$250.00\"").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_deserialize_null_is_zero() {
        let amount: Amount = serde_json::from_str("null").unwrap();
        assert!(amount.is_zero());
    }

    #[test]
    fn test_round2_does_not_overflow() {
        assert_eq!(round2(Decimal::MAX), Decimal::MAX);
        assert_eq!(round2(Decimal::MIN), Decimal::MIN);
        assert_eq!(
            round2(dec("10000000000000000000000000.125")),
            dec("10000000000000000000000000.13")
        );
    }

    #[test]
    fn test_parse_rejects_huge_values() {
        assert!(Amount::from_str("999,999,999,999,999.99").is_ok());
        let e = Amount::from_str("1,000,000,000,000,000").unwrap_err();
        assert!(e.to_string().contains("too large"), "{e}");
        assert!(Amount::from_str("-$1000000000000000").is_err());
    }

    #[test]
    fn test_deserialize_rejects_huge_values() {
        assert!(serde_json::from_str::<Amount>("10000000000000000000000000000").is_err());
        assert!(serde_json::from_str::<Amount>("7e26").is_err());
        assert!(serde_json::from_str::<Amount>("1e300").is_err());
        assert!(serde_json::from_str::<Amount>("18446744073709551615").is_err());
        assert!(serde_json::from_str::<Amount>("-9223372036854775808").is_err());
    }

    #[test]
    fn test_is_negative() {
        assert!(Amount::from_cents(-1).is_negative());
        assert!(!Amount::ZERO.is_negative());
        assert!(!Amount::from_cents(1).is_negative());
    }
}
