//! Money types with exact integer arithmetic
//!
//! Amounts are held as integer minor units (cents for USD) so that no
//! floating-point drift can creep into split calculations. Percentages are
//! exact decimals; applying one to an amount yields whole minor units plus
//! an explicit fractional remainder that callers must allocate.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CHF,
    INR,
    AUD,
    CAD,
    SGD,
    HKD,
}

impl Currency {
    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Returns the currency symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
            Currency::CHF => "CHF",
            Currency::INR => "₹",
            Currency::AUD => "A$",
            Currency::CAD => "C$",
            Currency::SGD => "S$",
            Currency::HKD => "HK$",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::CHF => "CHF",
            Currency::INR => "INR",
            Currency::AUD => "AUD",
            Currency::CAD => "CAD",
            Currency::SGD => "SGD",
            Currency::HKD => "HKD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "JPY" => Ok(Currency::JPY),
            "CHF" => Ok(Currency::CHF),
            "INR" => Ok(Currency::INR),
            "AUD" => Ok(Currency::AUD),
            "CAD" => Ok(Currency::CAD),
            "SGD" => Ok(Currency::SGD),
            "HKD" => Ok(Currency::HKD),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid percentage: {0} (must be between 0 and 100)")]
    InvalidPercentage(Decimal),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Overflow during calculation")]
    Overflow,
}

/// A monetary amount in integer minor units with its currency
///
/// `Money` is signed: adjustments such as penalties and refunds are
/// negative amounts. Arithmetic is checked for both currency and overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

impl Money {
    /// Creates Money from an integer amount in minor units (e.g., cents)
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self {
            minor: minor_units,
            currency,
        }
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    /// Returns the amount in minor units
    pub fn minor_units(&self) -> i64 {
        self.minor
    }

    /// Returns the amount in major units as an exact decimal (for display)
    pub fn to_major(&self) -> Decimal {
        Decimal::new(self.minor, self.currency.decimal_places())
    }

    /// Returns the currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    pub fn is_positive(&self) -> bool {
        self.minor > 0
    }

    pub fn is_negative(&self) -> bool {
        self.minor < 0
    }

    /// Fails with `CurrencyMismatch` unless both amounts share a currency
    pub fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(())
    }

    /// Checked addition that returns an error on currency mismatch or overflow
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let minor = self.minor.checked_add(other.minor).ok_or(MoneyError::Overflow)?;
        Ok(Self::from_minor(minor, self.currency))
    }

    /// Checked subtraction that returns an error on currency mismatch or overflow
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let minor = self.minor.checked_sub(other.minor).ok_or(MoneyError::Overflow)?;
        Ok(Self::from_minor(minor, self.currency))
    }

    /// Checked negation
    pub fn checked_neg(&self) -> Result<Money, MoneyError> {
        let minor = self.minor.checked_neg().ok_or(MoneyError::Overflow)?;
        Ok(Self::from_minor(minor, self.currency))
    }

    /// Sums amounts that must all be in `currency`
    pub fn try_sum<'a, I>(amounts: I, currency: Currency) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.currency.symbol(), self.to_major())
    }
}

/// A percentage in the closed range 0..=100
///
/// Stored as an exact decimal (e.g. `33.33`), never as a float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percentage(Decimal);

impl Percentage {
    /// Creates a percentage, rejecting values outside 0..=100
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value < Decimal::ZERO || value > dec!(100) {
            return Err(MoneyError::InvalidPercentage(value));
        }
        Ok(Self(value.normalize()))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the percentage value (e.g. `30` for 30%)
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Applies this percentage to a non-negative amount in minor units
    ///
    /// The exact product is split into whole minor units (floor) and the
    /// fractional remainder in `[0, 1)`.
    pub fn of_minor(&self, base: i64) -> Result<PercentageShare, MoneyError> {
        if base < 0 {
            return Err(MoneyError::InvalidAmount(format!(
                "percentage base must be non-negative, got {}",
                base
            )));
        }
        let exact = Decimal::from(base)
            .checked_mul(self.0)
            .ok_or(MoneyError::Overflow)?
            / dec!(100);
        let floor = exact.floor();
        let whole = floor.to_i64().ok_or(MoneyError::Overflow)?;
        Ok(PercentageShare {
            whole,
            fraction: exact - floor,
        })
    }
}

impl TryFrom<Decimal> for Percentage {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percentage> for Decimal {
    fn from(p: Percentage) -> Decimal {
        p.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Result of applying a percentage to an integer amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PercentageShare {
    /// Whole minor units (floor of the exact product)
    pub whole: i64,
    /// Fractional remainder, `0 <= fraction < 1`
    pub fraction: Decimal,
}

impl PercentageShare {
    /// The exact, unrounded product
    pub fn exact(&self) -> Decimal {
        Decimal::from(self.whole) + self.fraction
    }
}

/// Apportions exact non-negative entitlements into whole minor units
///
/// Every entry first receives the floor of its entitlement. The entries then
/// collectively receive `floor(Σ entitlements)`: the missing units are handed
/// out one at a time to the entries with the largest fractional remainder,
/// ties going to the smallest key. The output is in input order and is fully
/// determined by the input.
pub fn apportion<K: Ord>(entitlements: &[(K, Decimal)]) -> Result<Vec<i64>, MoneyError> {
    let mut amounts = Vec::with_capacity(entitlements.len());
    let mut fractions = Vec::with_capacity(entitlements.len());
    let mut total_exact = Decimal::ZERO;

    for (_, exact) in entitlements {
        if exact.is_sign_negative() && !exact.is_zero() {
            return Err(MoneyError::InvalidAmount(format!(
                "entitlement must be non-negative, got {}",
                exact
            )));
        }
        let floor = exact.floor();
        amounts.push(floor.to_i64().ok_or(MoneyError::Overflow)?);
        fractions.push(*exact - floor);
        total_exact = total_exact.checked_add(*exact).ok_or(MoneyError::Overflow)?;
    }

    let target = total_exact.floor().to_i64().ok_or(MoneyError::Overflow)?;
    let floored: i64 = amounts.iter().sum();
    let outstanding = (target - floored).max(0) as usize;

    if outstanding > 0 {
        let mut order: Vec<usize> = (0..entitlements.len()).collect();
        order.sort_by(|&a, &b| {
            fractions[b]
                .cmp(&fractions[a])
                .then_with(|| entitlements[a].0.cmp(&entitlements[b].0))
        });
        for &index in order.iter().take(outstanding) {
            amounts[index] += 1;
        }
    }

    Ok(amounts)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn apportion_hands_out_floor_of_total(
            base in 0i64..1_000_000_000i64,
            basis_points in proptest::collection::vec(0u32..2_500u32, 1..5)
        ) {
            let entitlements: Vec<(usize, Decimal)> = basis_points
                .iter()
                .enumerate()
                .map(|(i, bp)| {
                    let p = Percentage::new(Decimal::new(*bp as i64, 2)).unwrap();
                    (i, p.of_minor(base).unwrap().exact())
                })
                .collect();
            let total: Decimal = entitlements.iter().map(|(_, e)| *e).sum();

            let amounts = apportion(&entitlements).unwrap();

            prop_assert_eq!(Decimal::from(amounts.iter().sum::<i64>()), total.floor());
            for (amount, (_, exact)) in amounts.iter().zip(&entitlements) {
                prop_assert!(Decimal::from(*amount) >= exact.floor());
                prop_assert!(Decimal::from(*amount) <= exact.floor() + Decimal::ONE);
            }
        }
    }
}
