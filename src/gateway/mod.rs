//! Gateway client implementations
//!
//! This module provides the [`GatewayClient`] implementations and a factory to
//! select one at startup:
//! - `http` - Stripe-compatible REST client with bounded retries
//! - `sandbox` - In-process gateway for local runs and tests

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;

use crate::core::traits::GatewayClient;

pub mod http;
pub mod sandbox;

pub use http::HttpGatewayClient;
pub use sandbox::{GatewayOp, SandboxGateway};

/// Default base URL of the remote gateway
pub const DEFAULT_BASE_URL: &str = "https://api.stripe.com";

/// Gateway implementation
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GatewayKind {
    /// Remote gateway over HTTP
    Http,
    /// In-process sandbox, no network access
    Sandbox,
}

/// Settings for the HTTP gateway client
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: Option<String>,
    /// Additional attempts after a connect error or timeout
    pub max_retries: u32,
    /// Per-request timeout
    pub timeout: Duration,
    /// Backoff unit; attempt `n` waits `n * retry_backoff`
    pub retry_backoff: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            secret_key: None,
            max_retries: 2,
            timeout: Duration::from_secs(15),
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// Create a gateway client based on the specified kind
///
/// # Arguments
///
/// * `kind` - Which implementation to build
/// * `config` - HTTP settings (ignored for the sandbox)
///
/// # Returns
///
/// * `Ok(Arc<dyn GatewayClient>)` - Shared client for the orchestrator and
///   reconciler
/// * `Err(String)` - The HTTP client could not be configured
pub fn create_gateway(
    kind: GatewayKind,
    config: &GatewayConfig,
) -> Result<Arc<dyn GatewayClient>, String> {
    match kind {
        GatewayKind::Http => Ok(Arc::new(HttpGatewayClient::new(config)?)),
        GatewayKind::Sandbox => Ok(Arc::new(SandboxGateway::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_needs_no_credentials() {
        assert!(create_gateway(GatewayKind::Sandbox, &GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_http_requires_secret_key() {
        let result = create_gateway(GatewayKind::Http, &GatewayConfig::default());
        assert!(result.is_err());

        let config = GatewayConfig {
            secret_key: Some("sk_test_123".to_string()),
            ..Default::default()
        };
        assert!(create_gateway(GatewayKind::Http, &config).is_ok());
    }
}
