//! HTTP client for the Gemini API.
//!
//! Handles authentication, request formatting, and rate-limit recovery.
//! Requests that come back 429 are retried with exponential backoff and
//! jitter up to a small fixed attempt count; every other non-success status
//! is surfaced to the caller as an API error.

use std::time::Duration;

use rand::Rng;
use reqwest::{Client as ReqwestClient, StatusCode};
use tracing::{debug, warn};

use crate::analyzer::error::AnalyzerError;
use crate::analyzer::types::{GenerateContentRequest, GenerateContentResponse};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";

/// Default timeout for API requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Retries after a 429 before giving up.
const MAX_RETRIES: u32 = 3;

/// Fallback wait when the server sends no Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Backoff ceiling in seconds.
const MAX_BACKOFF_SECS: u64 = 60;

/// Client for the Gemini generateContent endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: ReqwestClient,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    /// Creates a client authenticating with `api_key`.
    pub fn new(api_key: impl Into<String>) -> Result<Self, AnalyzerError> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Points the client at a different endpoint. Used by tests to target a
    /// local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sends a generateContent request, retrying on rate limits.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AnalyzerError> {
        let url = format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, API_VERSION, model
        );

        let mut attempts = 0;
        loop {
            let response = self
                .client
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(request)
                .send()
                .await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                attempts += 1;
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

                if attempts > MAX_RETRIES {
                    warn!(model, attempts, "rate limit retries exhausted");
                    return Err(AnalyzerError::RateLimitExhausted { attempts });
                }

                let delay = backoff_delay(retry_after, attempts);
                debug!(
                    model,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(AnalyzerError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response.json().await?);
        }
    }
}

/// Exponential backoff with ±20% jitter, capped at [`MAX_BACKOFF_SECS`].
fn backoff_delay(base_secs: u64, attempt: u32) -> Duration {
    let exp = u64::pow(2, attempt.saturating_sub(1).min(10));
    let mut secs = base_secs.saturating_mul(exp).min(MAX_BACKOFF_SECS);
    if secs > 1 {
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        secs = ((secs as f64) * jitter) as u64;
    }
    Duration::from_secs(secs.min(MAX_BACKOFF_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_within_cap() {
        let first = backoff_delay(1, 1);
        assert_eq!(first, Duration::from_secs(1));

        // 5 * 2^2 = 20s, jittered into [16, 24].
        let third = backoff_delay(5, 3);
        assert!(third >= Duration::from_secs(16));
        assert!(third <= Duration::from_secs(24));

        let huge = backoff_delay(30, 8);
        assert!(huge <= Duration::from_secs(MAX_BACKOFF_SECS));
    }
}
