//! Rate-limited HTTP fetch client
//!
//! This module handles every provider request, including:
//! - Building the HTTP client with a proper user agent string
//! - Pacing: a fixed delay before each request, one request in flight
//! - Retry logic for timeouts, HTTP 429 and connection failures
//! - Error classification and diagnostic logging of non-2xx responses

use crate::config::{FetchConfig, UserAgentConfig};
use crate::fetch::diagnostic_log::{DiagnosticLog, ResponseDiagnostic};
use crate::fetch::error::FetchError;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::UserAgentConfig;
/// use catalog_harvest::fetch::build_http_client;
///
/// let config = UserAgentConfig {
///     client_name: "CatalogHarvest".to_string(),
///     client_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, 10_000).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout_ms: u64) -> Result<Client, reqwest::Error> {
    // Format: ClientName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.client_name, config.client_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_millis(timeout_ms))
        .connect_timeout(Duration::from_millis(timeout_ms))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Per-request retry bookkeeping
#[derive(Debug, Default)]
struct RetryState {
    timeouts: u32,
    rate_limited: u32,
    connection_wait_ms: u64,
}

/// Sequential, paced fetch client
///
/// Every method takes `&mut self`, so at most one request is in flight.
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Return the body |
/// | HTTP 429 | Cooldown, retry up to `rate_limit_attempts` attempts → TooManyRequests |
/// | Other non-2xx | Immediate classified error (401/403/404/5xx/unknown) |
/// | Timeout | Retry up to `timeout_attempts` attempts, `attempt × backoff` → RequestTimeout |
/// | Connection error | Retry every `connection_retry_wait_ms` until the ceiling → fatal |
/// | Other transport error | Immediate UnknownClientOrServerError |
pub struct FetchClient {
    client: Client,
    config: FetchConfig,
    diagnostics: DiagnosticLog,
    requests_sent: u64,
}

impl FetchClient {
    pub fn new(
        user_agent: &UserAgentConfig,
        config: FetchConfig,
        diagnostics: DiagnosticLog,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, config.timeout_ms)?;
        Ok(Self {
            client,
            config,
            diagnostics,
            requests_sent: 0,
        })
    }

    /// Number of HTTP requests sent, retries included
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    /// Fetches `url` and parses the body as JSON
    pub async fn fetch(&mut self, url: &str) -> Result<serde_json::Value, FetchError> {
        self.fetch_json(url).await
    }

    /// Fetches `url` and deserializes the body into `T`
    pub async fn fetch_json<T: DeserializeOwned>(&mut self, url: &str) -> Result<T, FetchError> {
        let (status, body) = self.fetch_bytes(url).await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            status,
            detail: e.to_string(),
        })
    }

    async fn fetch_bytes(&mut self, url: &str) -> Result<(u16, Vec<u8>), FetchError> {
        let mut retry = RetryState::default();

        loop {
            sleep(Duration::from_millis(self.config.request_delay_ms)).await;
            self.requests_sent += 1;

            let result = match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        self.record_response(url, response).await;

                        if status == StatusCode::TOO_MANY_REQUESTS {
                            retry.rate_limited += 1;
                            if retry.rate_limited >= self.config.rate_limit_attempts {
                                return Err(FetchError::from_status(url, status));
                            }
                            tracing::warn!(
                                "Rate limited by {} (attempt {}/{}), cooling down {}ms",
                                url,
                                retry.rate_limited,
                                self.config.rate_limit_attempts,
                                self.config.rate_limit_cooldown_ms
                            );
                            sleep(Duration::from_millis(self.config.rate_limit_cooldown_ms)).await;
                            continue;
                        }

                        return Err(FetchError::from_status(url, status));
                    }

                    response
                        .bytes()
                        .await
                        .map(|body| (status.as_u16(), body.to_vec()))
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(ok) => return Ok(ok),
                Err(error) => self.back_off_transport(url, error, &mut retry).await?,
            }
        }
    }

    /// Waits before the next attempt after a transport error, or gives up
    async fn back_off_transport(
        &self,
        url: &str,
        error: reqwest::Error,
        retry: &mut RetryState,
    ) -> Result<(), FetchError> {
        if error.is_timeout() {
            retry.timeouts += 1;
            if retry.timeouts >= self.config.timeout_attempts {
                tracing::warn!("Request to {} timed out {} times", url, retry.timeouts);
                return Err(FetchError::timeout(url));
            }

            let backoff = u64::from(retry.timeouts) * self.config.timeout_backoff_ms;
            tracing::warn!(
                "Request to {} timed out (attempt {}/{}), retrying in {}ms",
                url,
                retry.timeouts,
                self.config.timeout_attempts,
                backoff
            );
            sleep(Duration::from_millis(backoff)).await;
            return Ok(());
        }

        // Redirect loops, bad URLs, decode failures: asking again won't help
        if !error.is_connect() && !error.is_body() {
            tracing::warn!("Request to {} failed: {}", url, error);
            return Err(FetchError::transport(url, &error));
        }

        // DNS, refused, reset: assume the local network heals
        let wait = self.config.connection_retry_wait_ms;
        if retry.connection_wait_ms + wait > self.config.connection_retry_ceiling_ms {
            return Err(FetchError::Connection {
                url: url.to_string(),
                waited_ms: retry.connection_wait_ms,
                source: error,
            });
        }

        tracing::warn!(
            "Connection error for {}: {} (waited {}ms so far), retrying in {}ms",
            url,
            error,
            retry.connection_wait_ms,
            wait
        );
        sleep(Duration::from_millis(wait)).await;
        retry.connection_wait_ms += wait;
        Ok(())
    }

    async fn record_response(&self, url: &str, response: reqwest::Response) {
        let entry = ResponseDiagnostic::capture(url, response).await;
        tracing::debug!("HTTP {} from {}", entry.status, url);
        if let Err(e) = self.diagnostics.append(&entry) {
            tracing::warn!("Failed to write response diagnostic for {}: {}", url, e);
        }
    }
}
