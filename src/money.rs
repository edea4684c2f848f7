//! Fixed-point money arithmetic for order totals.
//!
//! Amounts are held as [`Decimal`] values normalized to two fraction digits and
//! persisted as their string form (`"25.50"`), so a value read back from storage
//! compares equal to the value that was written.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of fraction digits carried by every monetary amount.
pub const MONEY_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("'{0}' is not a valid decimal amount")]
    Invalid(String),

    #[error("amount {0} must not be negative")]
    Negative(Decimal),

    #[error("quantity {0} must be at least 1")]
    InvalidQuantity(i32),

    #[error("amount overflowed while computing a total")]
    Overflow,
}

/// A non-negative monetary amount with exactly two fraction digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    pub fn zero() -> Self {
        Self::round(Decimal::ZERO)
    }

    /// Rounds `amount` half away from zero to two fraction digits.
    /// Negative values are rejected.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        Ok(Self::round(amount))
    }

    /// Parses a decimal string such as `"10.5"` or `"10.50"`.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let amount = Decimal::from_str(input.trim())
            .map_err(|_| MoneyError::Invalid(input.to_string()))?;
        Self::new(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    fn round(amount: Decimal) -> Self {
        let mut rounded =
            amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(MONEY_SCALE);
        Money(rounded)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::new(amount).map_err(serde::de::Error::custom)
    }
}

/// `price * quantity`, rounded to two fraction digits.
pub fn line_total(price: Money, quantity: i32) -> Result<Money, MoneyError> {
    if quantity < 1 {
        return Err(MoneyError::InvalidQuantity(quantity));
    }
    price
        .0
        .checked_mul(Decimal::from(quantity))
        .map(Money::round)
        .ok_or(MoneyError::Overflow)
}

/// Exact sum of `price * quantity` over every line, rounded once at the end.
pub fn order_total<I>(lines: I) -> Result<Money, MoneyError>
where
    I: IntoIterator<Item = (Money, i32)>,
{
    let mut total = Decimal::ZERO;
    for (price, quantity) in lines {
        if quantity < 1 {
            return Err(MoneyError::InvalidQuantity(quantity));
        }
        let line = price
            .0
            .checked_mul(Decimal::from(quantity))
            .ok_or(MoneyError::Overflow)?;
        total = total.checked_add(line).ok_or(MoneyError::Overflow)?;
    }
    Ok(Money::round(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn money(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    #[test]
    fn display_always_has_two_fraction_digits() {
        assert_eq!(money("25.5").to_string(), "25.50");
        assert_eq!(money("7").to_string(), "7.00");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn order_total_sums_every_line() {
        let total = order_total(vec![(money("10.00"), 2), (money("5.50"), 1)]).unwrap();
        assert_eq!(total.to_string(), "25.50");
    }

    #[test]
    fn empty_order_totals_zero() {
        assert_eq!(order_total(Vec::new()).unwrap(), Money::zero());
    }

    #[test]
    fn stored_form_reads_back_exactly() {
        let original = order_total(vec![(money("0.10"), 3), (money("0.20"), 1)]).unwrap();
        let stored = original.to_string();
        assert_eq!(stored, "0.50");
        assert_eq!(Money::parse(&stored).unwrap(), original);
    }

    #[rstest]
    #[case("-1.00")]
    #[case("abc")]
    #[case("")]
    fn parse_rejects_bad_amounts(#[case] input: &str) {
        assert!(Money::parse(input).is_err());
    }

    #[test]
    fn trailing_zeros_are_dropped() {
        assert_eq!(Money::new(dec!(3.1000)).unwrap().to_string(), "3.10");
    }

    #[rstest]
    #[case(dec!(10.005), "10.01")]
    #[case(dec!(10.004), "10.00")]
    #[case(dec!(0.125), "0.13")]
    fn sub_cent_amounts_round_half_away_from_zero(#[case] amount: Decimal, #[case] expected: &str) {
        assert_eq!(Money::new(amount).unwrap().to_string(), expected);
    }

    #[rstest]
    #[case(0)]
    #[case(-3)]
    fn line_total_rejects_non_positive_quantity(#[case] quantity: i32) {
        assert_eq!(
            line_total(money("1.00"), quantity),
            Err(MoneyError::InvalidQuantity(quantity))
        );
    }

    #[test]
    fn line_total_multiplies() {
        assert_eq!(line_total(money("19.99"), 3).unwrap().to_string(), "59.97");
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&money("4.2")).unwrap();
        assert_eq!(json, "\"4.20\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, money("4.20"));
        assert!(serde_json::from_str::<Money>("\"-2\"").is_err());
    }

    #[test]
    fn deserializing_rounds_to_cents() {
        let value: Money = serde_json::from_str("\"12.345\"").unwrap();
        assert_eq!(value.to_string(), "12.35");
    }
}
