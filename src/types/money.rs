//! Money and currency types
//!
//! Inbound amounts arrive in major units (for example `1000` LKR or `"12.50"`
//! USD). The gateway charges in the smallest currency unit, so every amount is
//! converted once, at validation time, into a [`Money`] value holding minor
//! units as an `i64`.
//!
//! # Minor units
//!
//! The number of decimal places per currency follows ISO 4217:
//! - zero-decimal currencies (JPY, KRW, ...) use exponent 0
//! - BHD, JOD, KWD, OMR and TND use exponent 3
//! - everything else uses exponent 2
//!
//! Amounts with more decimal places than the currency allows are rounded
//! half away from zero.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::error::PaymentError;

const ZERO_DECIMAL: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

const THREE_DECIMAL: &[&str] = &["bhd", "jod", "kwd", "omr", "tnd"];

/// Currency used when a request does not name one
pub const LOCAL_CURRENCY: &str = "lkr";

/// Three-letter ISO 4217 currency code, stored lowercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parse and normalise a currency code
    ///
    /// # Returns
    ///
    /// * `Ok(Currency)` - For any three ASCII letters (case-insensitive)
    /// * `Err(PaymentError::Validation)` - Otherwise
    pub fn new(code: &str) -> Result<Self, PaymentError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PaymentError::validation(format!(
                "Invalid currency code '{}'",
                code
            )));
        }
        Ok(Self(code.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of decimal places in the currency's minor unit
    pub fn minor_unit_exponent(&self) -> u32 {
        if ZERO_DECIMAL.contains(&self.as_str()) {
            0
        } else if THREE_DECIMAL.contains(&self.as_str()) {
            3
        } else {
            2
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self(LOCAL_CURRENCY.to_string())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Currency {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

/// An amount in minor units of a currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the smallest currency unit (cents, paisa, yen, ...)
    pub minor: i64,
    pub currency: Currency,
}

impl Money {
    pub fn from_minor(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// Convert a major-unit amount into minor units
    ///
    /// # Returns
    ///
    /// * `Ok(Money)` - The rounded minor-unit amount
    /// * `Err(PaymentError::Validation)` - If the amount is not positive or
    ///   does not fit in an `i64` once scaled
    pub fn from_major(amount: Decimal, currency: Currency) -> Result<Self, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::validation(format!(
                "Amount must be greater than zero, received {}",
                amount
            )));
        }

        let exponent = currency.minor_unit_exponent();
        let scale = Decimal::from(10_i64.pow(exponent));
        let minor = amount
            .round_dp_with_strategy(exponent, RoundingStrategy::MidpointAwayFromZero)
            .checked_mul(scale)
            .and_then(|scaled| scaled.to_i64())
            .ok_or_else(|| {
                PaymentError::validation(format!("Amount {} is too large", amount))
            })?;

        if minor == 0 {
            return Err(PaymentError::validation(format!(
                "Amount {} rounds to zero in {}",
                amount, currency
            )));
        }

        Ok(Self { minor, currency })
    }

    /// The amount expressed in major units
    pub fn to_major(&self) -> Decimal {
        Decimal::new(self.minor, self.currency.minor_unit_exponent())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_major(), self.currency.as_str().to_uppercase())
    }
}
