//! Money types with precise decimal arithmetic
//!
//! Expense amounts (estimated, total, authorized) are carried as `Money` so
//! sums over a request never mix currencies silently.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    EUR,
    USD,
    GBP,
    CHF,
    JPY,
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
            Currency::EUR => "€",
            Currency::USD => "$",
            Currency::GBP => "£",
            Currency::CHF => "CHF",
            Currency::JPY => "¥",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::EUR => "EUR",
            Currency::USD => "USD",
            Currency::GBP => "GBP",
            Currency::CHF => "CHF",
            Currency::JPY => "JPY",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EUR" => Ok(Currency::EUR),
            "USD" => Ok(Currency::USD),
            "GBP" => Ok(Currency::GBP),
            "CHF" => Ok(Currency::CHF),
            "JPY" => Ok(Currency::JPY),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount overflow: {0}")]
    Overflow(String),
}

/// A monetary amount with associated currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value, keeping four decimal places internally
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: amount.round_dp(4),
            currency,
        }
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Checked addition
    ///
    /// # Errors
    ///
    /// `CurrencyMismatch` on differing currencies, `Overflow` if the result
    /// does not fit a `Decimal`
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let amount = self.amount.checked_add(other.amount).ok_or_else(|| {
            MoneyError::Overflow(format!("{} + {}", self.amount, other.amount))
        })?;
        Ok(Self::new(amount, self.currency))
    }

    /// Checked subtraction
    ///
    /// # Errors
    ///
    /// `CurrencyMismatch` on differing currencies, `Overflow` if the result
    /// does not fit a `Decimal`
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let amount = self.amount.checked_sub(other.amount).ok_or_else(|| {
            MoneyError::Overflow(format!("{} - {}", self.amount, other.amount))
        })?;
        Ok(Self::new(amount, self.currency))
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(())
    }

    /// Sums an iterator of amounts, starting from zero in `currency`
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` as soon as one item is in another currency
    pub fn sum<'a, I>(currency: Currency, items: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        items
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }

    /// Rounds to the currency's standard decimal places
    pub fn round_to_currency(&self) -> Self {
        Self {
            amount: self.amount.round_dp(self.currency.decimal_places()),
            currency: self.currency,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency.decimal_places();
        write!(
            f,
            "{} {:.dp$}",
            self.currency.symbol(),
            self.amount,
            dp = dp as usize
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_creation_rounds_to_four_places() {
        let m = Money::new(dec!(100.123456), Currency::EUR);
        assert_eq!(m.amount(), dec!(100.1235));
        assert_eq!(m.currency(), Currency::EUR);
    }

    #[test]
    fn test_currency_mismatch() {
        let eur = Money::new(dec!(100.00), Currency::EUR);
        let usd = Money::new(dec!(100.00), Currency::USD);

        let result = eur.checked_add(&usd);
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let huge = Money::new(Decimal::MAX, Currency::EUR);

        assert!(matches!(huge.checked_add(&huge), Err(MoneyError::Overflow(_))));
        assert!(matches!(
            Money::sum(Currency::EUR, &[huge, huge]),
            Err(MoneyError::Overflow(_))
        ));

        let negative = Money::new(Decimal::MIN, Currency::EUR);
        assert!(matches!(negative.checked_sub(&huge), Err(MoneyError::Overflow(_))));
    }

    #[test]
    fn test_currency_parsing_is_case_insensitive() {
        assert_eq!("eur".parse::<Currency>().unwrap(), Currency::EUR);
        assert!("XXX".parse::<Currency>().is_err());
    }
}
