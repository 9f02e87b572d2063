//! HTTP plumbing shared by the model and search clients.

use std::time::Duration;

use crate::error::MarketError;

/// HTTP client with the configured request timeout.
pub fn client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

/// Map a transport error, distinguishing timeouts.
pub fn request_error(provider: &str, timeout_secs: u64, e: reqwest::Error) -> MarketError {
    if e.is_timeout() {
        MarketError::ProviderTimeout {
            provider: provider.to_string(),
            timeout_secs,
        }
    } else {
        MarketError::provider(provider, e.to_string())
    }
}

/// Turn a non-2xx response into a provider error carrying the body.
pub async fn status_error(provider: &str, response: reqwest::Response) -> MarketError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown".to_string());
    MarketError::provider(provider, format!("HTTP {}: {}", status, body))
}
