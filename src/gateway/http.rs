//! HTTP gateway client
//!
//! `HttpGatewayClient` talks to a Stripe-compatible payment intents API:
//! form-encoded requests, bearer authentication and a JSON error envelope.
//!
//! ```text
//! POST /v1/payment_intents                 create
//! GET  /v1/payment_intents/{id}            retrieve
//! POST /v1/payment_intents/{id}/capture    capture
//! POST /v1/payment_intents/{id}/confirm    confirm
//! GET  /v1/payment_methods/{id}            billing details
//! ```
//!
//! # Retries
//!
//! Only transport failures (connect errors and timeouts) are retried, at most
//! `max_retries` times with a linear backoff. Every `create` carries an
//! `Idempotency-Key` that stays the same across its retries, so a retried
//! create can never produce a second intent. Gateway error responses are
//! never retried here; they are returned for classification.
//!
//! # Resource ids
//!
//! Ids reach this client from callers, so they are checked against the
//! gateway's id alphabet (`[A-Za-z0-9_]`) and pushed as escaped path
//! segments. An id can never address a different resource than the one
//! named.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::GatewayConfig;
use crate::core::traits::GatewayClient;
use crate::types::{
    BillingDetails, CreateIntentParams, GatewayError, GatewayErrorCategory, RemoteIntent,
};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
    code: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentMethod {
    #[serde(default)]
    billing_details: BillingDetails,
}

/// Gateway client over HTTP
pub struct HttpGatewayClient {
    client: reqwest::Client,
    base_url: Url,
    secret_key: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpGatewayClient {
    /// Create a client from the gateway configuration
    ///
    /// # Returns
    ///
    /// * `Ok(HttpGatewayClient)` - Ready to use
    /// * `Err(String)` - No secret key configured, the base URL is invalid,
    ///   or the HTTP client could not be built
    pub fn new(config: &GatewayConfig) -> Result<Self, String> {
        let secret_key = config
            .secret_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| "a gateway secret key is required for the http gateway".to_string())?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| format!("Invalid gateway URL '{}': {}", config.base_url, e))?;
        if base_url.cannot_be_a_base() {
            return Err(format!("Invalid gateway URL '{}'", config.base_url));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url,
            secret_key,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    /// Resolve path segments against the base URL, escaping each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::new(
                    GatewayErrorCategory::InvalidRequest,
                    format!("gateway URL {} cannot take a path", self.base_url),
                )
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, GatewayError> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        let mut attempt = 0;

        loop {
            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .bearer_auth(&self.secret_key);
            if !form.is_empty() {
                request = request.form(form);
            }
            if let Some(key) = idempotency_key {
                request = request.header(IDEMPOTENCY_HEADER, key);
            }

            match request.send().await {
                Ok(response) => return parse_response(response).await,
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.retry_backoff * attempt;
                    warn!(
                        "Retry {}/{} for {} {}. Waiting {:?}",
                        attempt, self.max_retries, method, path, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(GatewayError::connection(format!(
                        "{} {} failed: {}",
                        method, path, e
                    )))
                }
            }
        }
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::connection(format!("failed to read response: {}", e)))?;

    if status.is_success() {
        return serde_json::from_str(&body).map_err(|e| {
            GatewayError::new(
                GatewayErrorCategory::Api,
                format!("unexpected response from gateway: {}", e),
            )
        });
    }

    debug!(status = status.as_u16(), "gateway returned an error response");
    Err(error_from_response(status, &body))
}

/// Build a gateway error from a non-success response
///
/// The `error.type` of the JSON envelope decides the category. Responses
/// without an envelope fall back to the HTTP status.
fn error_from_response(status: StatusCode, body: &str) -> GatewayError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();

    let category = match envelope.as_ref().and_then(|e| e.error.error_type.as_deref()) {
        Some(error_type) => GatewayErrorCategory::from_type(error_type),
        None => category_for_status(status),
    };

    match envelope {
        Some(ErrorEnvelope { error }) => GatewayError {
            category,
            message: error
                .message
                .unwrap_or_else(|| format!("gateway returned HTTP {}", status.as_u16())),
            code: error.code,
            param: error.param,
            decline_code: error.decline_code,
        },
        None => GatewayError::new(
            category,
            format!("gateway returned HTTP {}", status.as_u16()),
        ),
    }
}

fn category_for_status(status: StatusCode) -> GatewayErrorCategory {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayErrorCategory::Authentication,
        StatusCode::TOO_MANY_REQUESTS => GatewayErrorCategory::RateLimited,
        StatusCode::PAYMENT_REQUIRED => GatewayErrorCategory::CardDeclined,
        s if s.is_server_error() => GatewayErrorCategory::Api,
        s if s.is_client_error() => GatewayErrorCategory::InvalidRequest,
        s => GatewayErrorCategory::Unrecognized(format!("http_{}", s.as_u16())),
    }
}

/// Check a caller-supplied id before it becomes part of a URL
fn resource_id(id: &str) -> Result<&str, GatewayError> {
    let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(id)
    } else {
        Err(GatewayError::new(
            GatewayErrorCategory::InvalidRequest,
            format!("Invalid resource id '{}'", id),
        )
        .with_code("resource_missing")
        .with_param("id"))
    }
}

fn create_form(params: &CreateIntentParams) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), params.amount.to_string()),
        ("currency".to_string(), params.currency.clone()),
        ("capture_method".to_string(), "automatic".to_string()),
    ];
    form.extend(metadata_fields(&params.metadata));
    if let Some(email) = &params.receipt_email {
        form.push(("receipt_email".to_string(), email.clone()));
    }
    form
}

fn metadata_fields(metadata: &BTreeMap<String, String>) -> impl Iterator<Item = (String, String)> + '_ {
    metadata
        .iter()
        .map(|(key, value)| (format!("metadata[{}]", key), value.clone()))
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn create(&self, params: CreateIntentParams) -> Result<RemoteIntent, GatewayError> {
        let idempotency_key = Uuid::new_v4().to_string();
        self.execute(
            Method::POST,
            &["v1", "payment_intents"],
            &create_form(&params),
            Some(&idempotency_key),
        )
        .await
    }

    async fn retrieve(&self, id: &str) -> Result<RemoteIntent, GatewayError> {
        let id = resource_id(id)?;
        self.execute(Method::GET, &["v1", "payment_intents", id], &[], None)
            .await
    }

    async fn capture(&self, id: &str) -> Result<RemoteIntent, GatewayError> {
        let id = resource_id(id)?;
        self.execute(
            Method::POST,
            &["v1", "payment_intents", id, "capture"],
            &[],
            None,
        )
        .await
    }

    async fn confirm(&self, id: &str, instrument: &str) -> Result<RemoteIntent, GatewayError> {
        let id = resource_id(id)?;
        let form = [("payment_method".to_string(), instrument.to_string())];
        self.execute(
            Method::POST,
            &["v1", "payment_intents", id, "confirm"],
            &form,
            None,
        )
        .await
    }

    async fn billing_details(
        &self,
        payment_method_ref: &str,
    ) -> Result<BillingDetails, GatewayError> {
        let payment_method_ref = resource_id(payment_method_ref)?;
        let method: PaymentMethod = self
            .execute(
                Method::GET,
                &["v1", "payment_methods", payment_method_ref],
                &[],
                None,
            )
            .await?;
        Ok(method.billing_details)
    }
}
