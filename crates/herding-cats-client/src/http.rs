//! Shared HTTP plumbing for sessions, explorers and loaders.
//!
//! Every catalogue request goes through [`HttpFetcher::request_with_retry`],
//! which retries rate limits, server errors and transient transport failures.

use std::time::Duration;

use bytes::Bytes;
use herding_cats_core::HttpConfig;
use herding_cats_core::error::AppError;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, warn};

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("HerdingCats/", env!("CARGO_PKG_VERSION"));

/// HTTP client with the retry policy from [`HttpConfig`].
///
/// Cloning is cheap: the underlying `reqwest::Client` is reference counted.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
    config: HttpConfig,
}

impl HttpFetcher {
    /// Maximum backoff delay for rate-limited retries.
    const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

    /// Maximum retries for rate-limited (429) responses.
    /// With 500ms base and 30s cap: 1s, 2s, 4s, 8s, 16s, 30s, 30s, 30s, 30s.
    const RATE_LIMIT_MAX_RETRIES: u32 = 10;

    pub fn new() -> Result<Self, AppError> {
        Self::with_config(HttpConfig::default())
    }

    /// Builds a client using `config` for timeouts and retries.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn with_config(config: HttpConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Single GET with the short validation timeout and no retries.
    ///
    /// Used to check that a catalogue answers before a session is handed out.
    pub async fn probe(&self, url: &Url) -> Result<(), AppError> {
        let resp = self
            .client
            .get(url.clone())
            .timeout(self.config.validation_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.config.validation_timeout.as_secs())
                } else {
                    AppError::NetworkError(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::ClientError(format!(
                "HTTP {} from {}",
                status.as_u16(),
                url
            )));
        }
        Ok(())
    }

    /// GETs `url` and decodes the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, AppError> {
        let resp = self.request_with_retry(url).await?;
        resp.json::<T>()
            .await
            .map_err(|e| AppError::ClientError(format!("Failed to decode {}: {}", url, e)))
    }

    /// GETs `url` and returns the raw body.
    pub async fn get_bytes(&self, url: &Url) -> Result<Bytes, AppError> {
        let resp = self.request_with_retry(url).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AppError::NetworkError(format!("Failed to read body: {}", e)))?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }

    /// GETs `url`, retrying rate limits, 5xx and transient transport errors.
    ///
    /// Any other non-success status is returned immediately as
    /// `AppError::ClientError("HTTP {status} from {url}")`.
    pub async fn request_with_retry(&self, url: &Url) -> Result<reqwest::Response, AppError> {
        let max_retries = self.config.max_retries;
        let base_delay = self.config.retry_base_delay;
        let mut last_error = AppError::Generic("No attempts made".to_string());
        // Use higher retry count for 429s since they are transient
        let effective_max = Self::RATE_LIMIT_MAX_RETRIES.max(max_retries);

        for attempt in 1..=effective_max {
            match self.client.get(url.clone()).send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        return Ok(resp);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = AppError::RateLimitExceeded;
                        if attempt < effective_max {
                            let delay = resp
                                .headers()
                                .get("retry-after")
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.parse::<u64>().ok())
                                .map(Duration::from_secs)
                                .unwrap_or_else(|| {
                                    (base_delay * 2_u32.pow(attempt)).min(Self::MAX_RETRY_DELAY)
                                });
                            warn!(
                                "Rate limited by {} (attempt {}), retrying in {:?}",
                                url, attempt, delay
                            );
                            sleep(delay).await;
                            continue;
                        }
                        return Err(last_error);
                    }

                    if status.is_server_error() {
                        last_error = AppError::ClientError(format!(
                            "Server error: HTTP {}",
                            status.as_u16()
                        ));
                        if attempt < max_retries {
                            let delay = base_delay * attempt;
                            warn!(
                                "HTTP {} from {} (attempt {}), retrying in {:?}",
                                status.as_u16(),
                                url,
                                attempt,
                                delay
                            );
                            sleep(delay).await;
                            continue;
                        }
                    }

                    return Err(AppError::ClientError(format!(
                        "HTTP {} from {}",
                        status.as_u16(),
                        url
                    )));
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error = AppError::Timeout(self.config.timeout.as_secs());
                    } else if e.is_connect() {
                        last_error = AppError::NetworkError(format!("Connection failed: {}", e));
                    } else {
                        last_error = AppError::ClientError(e.to_string());
                    }

                    if attempt < max_retries && (e.is_timeout() || e.is_connect()) {
                        let delay = base_delay * attempt;
                        sleep(delay).await;
                        continue;
                    }
                    return Err(last_error);
                }
            }
        }

        Err(last_error)
    }
}
