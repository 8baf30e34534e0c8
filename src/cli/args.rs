use crate::core::{ChargeLimits, MinimumOverride, OperatingMode, ServiceConfig};
use crate::gateway::{GatewayConfig, GatewayKind, DEFAULT_BASE_URL};
use crate::types::Currency;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Serve the order payment API
#[derive(Parser, Debug)]
#[command(name = "order-payments")]
#[command(about = "Payment-intent lifecycle service for orders", long_about = None)]
pub struct CliArgs {
    /// Address the HTTP server listens on
    #[arg(
        long = "bind",
        value_name = "ADDR",
        env = "PAYMENTS_BIND",
        default_value = "0.0.0.0:3000"
    )]
    pub bind: SocketAddr,

    /// Operating mode; production hides gateway diagnostics from callers
    #[arg(
        long = "mode",
        value_name = "MODE",
        env = "PAYMENTS_MODE",
        default_value = "development"
    )]
    pub mode: OperatingMode,

    /// Confirm every new intent with the test card (refused in production)
    #[arg(long = "smoke-test")]
    pub smoke_test: bool,

    /// Gateway implementation
    #[arg(
        long = "gateway",
        value_name = "GATEWAY",
        env = "PAYMENTS_GATEWAY",
        default_value = "http",
        help = "Gateway: 'http' for the remote gateway or 'sandbox' for the in-process one"
    )]
    pub gateway: GatewayKind,

    /// Base URL of the remote gateway
    #[arg(
        long = "gateway-url",
        value_name = "URL",
        env = "GATEWAY_BASE_URL",
        default_value = DEFAULT_BASE_URL
    )]
    pub gateway_url: String,

    /// Secret API key of the remote gateway
    #[arg(
        long = "gateway-secret-key",
        value_name = "KEY",
        env = "GATEWAY_SECRET_KEY",
        hide_env_values = true
    )]
    pub gateway_secret_key: Option<String>,

    /// Retries after a connect error or timeout
    #[arg(
        long = "max-retries",
        value_name = "COUNT",
        env = "GATEWAY_MAX_RETRIES",
        default_value_t = 2
    )]
    pub max_retries: u32,

    /// Per-request gateway timeout in milliseconds
    #[arg(
        long = "gateway-timeout-ms",
        value_name = "MS",
        env = "GATEWAY_TIMEOUT_MS",
        default_value_t = 15_000
    )]
    pub gateway_timeout_ms: u64,

    /// Currency used when a request does not name one
    #[arg(
        long = "default-currency",
        value_name = "CODE",
        env = "PAYMENTS_DEFAULT_CURRENCY",
        default_value = "lkr"
    )]
    pub default_currency: Currency,

    /// Override a per-currency minimum charge, e.g. `lkr=150` (repeatable)
    #[arg(long = "min-charge", value_name = "CURRENCY=AMOUNT")]
    pub min_charge: Vec<MinimumOverride>,

    /// Number of runtime worker threads
    #[arg(
        long = "worker-threads",
        value_name = "COUNT",
        help = "Number of runtime worker threads (default: CPU cores)"
    )]
    pub worker_threads: Option<usize>,
}

impl CliArgs {
    /// Build the validated service configuration
    ///
    /// # Returns
    ///
    /// * `Ok(ServiceConfig)` - Default charge limits with `--min-charge`
    ///   overrides applied
    /// * `Err(String)` - Smoke-test mode was requested in production mode
    pub fn to_service_config(&self) -> Result<ServiceConfig, String> {
        let limits = self
            .min_charge
            .iter()
            .fold(ChargeLimits::default(), |limits, o| {
                limits.with_minimum(o.currency.clone(), o.minimum)
            });

        ServiceConfig::new(
            self.mode,
            self.smoke_test,
            self.default_currency.clone(),
            limits,
        )
    }

    /// Build the HTTP gateway settings
    pub fn to_gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.gateway_url.clone(),
            secret_key: self.gateway_secret_key.clone(),
            max_retries: self.max_retries,
            timeout: Duration::from_millis(self.gateway_timeout_ms),
            ..Default::default()
        }
    }

    /// Worker thread count, falling back to the number of CPU cores
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
            .filter(|&n| n > 0)
            .unwrap_or_else(num_cpus::get)
    }
}
