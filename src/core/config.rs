//! Service configuration
//!
//! `ServiceConfig` is built once at startup (see `CliArgs::to_service_config`)
//! and shared read-only by the orchestrator, the reconciler and the HTTP layer.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use rust_decimal::Decimal;

use crate::types::{Currency, Money, PaymentError};

/// Instrument used to confirm intents created in smoke-test mode
pub const SMOKE_TEST_INSTRUMENT: &str = "pm_card_visa";

/// Deployment mode
///
/// Controls whether gateway diagnostics are exposed to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OperatingMode {
    Production,
    Development,
}

impl OperatingMode {
    pub fn exposes_details(self) -> bool {
        !matches!(self, OperatingMode::Production)
    }
}

/// Minimum charge per currency, in major units
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeLimits {
    minimums: HashMap<Currency, Decimal>,
}

impl Default for ChargeLimits {
    fn default() -> Self {
        let defaults = [
            ("lkr", Decimal::new(150, 0)),
            ("usd", Decimal::new(50, 2)),
            ("eur", Decimal::new(50, 2)),
            ("gbp", Decimal::new(30, 2)),
            ("inr", Decimal::new(50, 2)),
            ("aud", Decimal::new(50, 2)),
            ("cad", Decimal::new(50, 2)),
            ("jpy", Decimal::new(50, 0)),
        ];

        let minimums = defaults
            .into_iter()
            .filter_map(|(code, min)| Currency::new(code).ok().map(|c| (c, min)))
            .collect();

        Self { minimums }
    }
}

impl ChargeLimits {
    /// Limits with no minimums at all
    pub fn empty() -> Self {
        Self {
            minimums: HashMap::new(),
        }
    }

    /// Set or replace the minimum for one currency
    pub fn with_minimum(mut self, currency: Currency, minimum: Decimal) -> Self {
        self.minimums.insert(currency, minimum);
        self
    }

    pub fn minimum_for(&self, currency: &Currency) -> Option<Decimal> {
        self.minimums.get(currency).copied()
    }

    /// Check a major-unit amount against the currency's minimum and convert it
    ///
    /// # Returns
    ///
    /// * `Ok(Money)` - The amount in minor units
    /// * `Err(PaymentError::Validation)` - If the amount is below the minimum
    ///   (the message names both) or otherwise not chargeable
    pub fn check(&self, amount: Decimal, currency: Currency) -> Result<Money, PaymentError> {
        if let Some(minimum) = self.minimum_for(&currency) {
            if amount < minimum {
                return Err(PaymentError::validation(format!(
                    "Amount must be at least {} {}, received {}",
                    minimum,
                    currency.as_str().to_uppercase(),
                    amount
                )));
            }
        }
        Money::from_major(amount, currency)
    }
}

/// A `currency=amount` override parsed from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct MinimumOverride {
    pub currency: Currency,
    pub minimum: Decimal,
}

impl FromStr for MinimumOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, amount) = s
            .split_once('=')
            .ok_or_else(|| format!("expected CURRENCY=AMOUNT, got '{}'", s))?;
        let currency = Currency::new(code).map_err(|e| e.to_string())?;
        let minimum = Decimal::from_str(amount.trim())
            .map_err(|_| format!("invalid minimum amount '{}'", amount))?;
        if minimum.is_sign_negative() {
            return Err(format!("minimum for {} must not be negative", currency));
        }
        Ok(Self { currency, minimum })
    }
}

impl fmt::Display for MinimumOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.currency, self.minimum)
    }
}

/// Configuration shared by the orchestrator, reconciler and HTTP layer
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub mode: OperatingMode,
    /// Auto-confirm every new intent with the test instrument
    pub smoke_test: bool,
    pub default_currency: Currency,
    pub limits: ChargeLimits,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Development,
            smoke_test: false,
            default_currency: Currency::default(),
            limits: ChargeLimits::default(),
        }
    }
}

impl ServiceConfig {
    /// Create a validated configuration
    ///
    /// Smoke-test mode confirms intents with a canned test card, so it is
    /// refused in production mode.
    pub fn new(
        mode: OperatingMode,
        smoke_test: bool,
        default_currency: Currency,
        limits: ChargeLimits,
    ) -> Result<Self, String> {
        if smoke_test && mode == OperatingMode::Production {
            return Err("smoke-test mode cannot be enabled in production mode".to_string());
        }
        Ok(Self {
            mode,
            smoke_test,
            default_currency,
            limits,
        })
    }
}
