//! Stripe REST API client.
//!
//! # Architecture
//!
//! - Stripe is the source of truth for products, prices and orders - the shop
//!   keeps no local copy
//! - Requests are form-encoded, authenticated with the secret key as a bearer
//!   token, and optionally pinned with `Stripe-Version`
//! - No retries: a 429 surfaces as [`StripeError::RateLimited`] and callers
//!   decide what to do
//!
//! Catalog reads go through [`crate::catalog::CatalogService`], which caches
//! them; the maintenance CLI talks to this client directly.

mod checkout;
pub mod conversions;
mod products;
pub mod types;
pub mod webhook;

pub use checkout::CheckoutProvider;
pub use products::{ActiveFilter, PAGE_SIZE};
pub use types::*;
pub use webhook::{Event, WebhookError};

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::StripeConfig;

/// Errors that can occur when calling Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed (connection, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Stripe answered with an error object.
    #[error("Stripe API error ({status}, {kind}): {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    /// Rate limited by Stripe.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Request timeout for every Stripe call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Stripe REST API.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
    api_version: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend
    /// initialization failure).
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("diecast-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_base: config.api_base.clone(),
                secret_key: config.secret_key.clone(),
                api_version: config.api_version.clone(),
            }),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/v1/{}", self.inner.api_base, path.trim_start_matches('/'));
        let mut builder = self
            .inner
            .client
            .request(method, url)
            .bearer_auth(self.inner.secret_key.expose_secret());
        if let Some(version) = &self.inner.api_version {
            builder = builder.header("Stripe-Version", version);
        }
        builder
    }

    /// `GET /v1/{path}` with query parameters.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, StripeError> {
        self.execute(self.request(Method::GET, path).query(query))
            .await
    }

    /// `POST /v1/{path}` with a form body.
    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, StripeError> {
        self.execute(self.request(Method::POST, path).form(form))
            .await
    }

    /// Send a request and decode the JSON response.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, StripeError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(StripeError::RateLimited(retry_after));
        }

        // Read the body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse Stripe response"
            );
            StripeError::Parse(e)
        })
    }
}

/// Map a non-success response to a `StripeError`.
fn api_error(status: StatusCode, body: &str) -> StripeError {
    let detail = serde_json::from_str::<types::ErrorBody>(body).ok().map(|b| b.error);
    let kind = detail
        .as_ref()
        .and_then(|d| d.kind.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let message = detail
        .and_then(|d| d.message)
        .unwrap_or_else(|| body.chars().take(200).collect());

    if status == StatusCode::NOT_FOUND {
        return StripeError::NotFound(message);
    }

    tracing::error!(
        status = %status,
        kind = %kind,
        message = %message,
        "Stripe API returned non-success status"
    );
    StripeError::Api {
        status: status.as_u16(),
        kind,
        message,
    }
}

/// Escape a value for a Stripe search query string literal.
pub(crate) fn escape_search_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_parses_stripe_body() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"No such price: 'price_x'"}}"#;
        match api_error(StatusCode::BAD_REQUEST, body) {
            StripeError::Api {
                status,
                kind,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(kind, "invalid_request_error");
                assert_eq!(message, "No such price: 'price_x'");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_not_found_and_unparseable() {
        assert!(matches!(
            api_error(StatusCode::NOT_FOUND, r#"{"error":{"message":"No such product"}}"#),
            StripeError::NotFound(m) if m == "No such product"
        ));
        assert!(matches!(
            api_error(StatusCode::BAD_GATEWAY, "upstream down"),
            StripeError::Api { status: 502, ref kind, ref message } if kind == "unknown" && message == "upstream down"
        ));
    }

    #[test]
    fn test_escape_search_value() {
        assert_eq!(escape_search_value("Dad's '67"), "Dad\\'s \\'67");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = StripeError::RateLimited(2);
        assert_eq!(err.to_string(), "Rate limited, retry after 2 seconds");
    }
}
