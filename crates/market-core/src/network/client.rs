//! HTTP client for the GitHub artifacts API.
//!
//! Wraps reqwest with:
//! - Static bearer authentication
//! - Rate limit tracking from response headers
//! - Status-to-error mapping (no retries; callers abort the cycle)

use crate::config::NetworkConfig;
use crate::{MarketError, Result};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tracing::debug;

/// Rate limit state extracted from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitState {
    /// Remaining requests allowed.
    pub remaining: Option<u64>,
    /// Total request limit.
    pub limit: Option<u64>,
    /// Unix timestamp when the rate limit resets.
    pub reset: Option<u64>,
}

impl RateLimitState {
    /// True once the server reported zero remaining requests.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Seconds until the rate limit window resets, if known and in the future.
    pub fn secs_until_reset(&self) -> Option<u64> {
        let now = chrono::Utc::now().timestamp();
        self.reset.and_then(|reset| {
            let reset = i64::try_from(reset).ok()?;
            (reset > now).then(|| (reset - now) as u64)
        })
    }
}

/// HTTP client with bearer auth and rate limit awareness.
pub struct HttpClient {
    client: Client,
    bearer_token: Option<String>,
    rate_limit_remaining: AtomicI64,
    rate_limit_limit: AtomicU64,
    rate_limit_reset: AtomicU64,
}

impl HttpClient {
    /// Create a client. `bearer_token` is attached to every request when set.
    pub fn new(bearer_token: Option<String>) -> Result<Self> {
        // No overall timeout here: bundle downloads can be large. API calls
        // set a per-request timeout instead.
        let client = Client::builder()
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| MarketError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: Some(e.to_string()),
            })?;

        Ok(Self {
            client,
            bearer_token: bearer_token.filter(|t| !t.trim().is_empty()),
            rate_limit_remaining: AtomicI64::new(-1),
            rate_limit_limit: AtomicU64::new(0),
            rate_limit_reset: AtomicU64::new(0),
        })
    }

    pub fn has_token(&self) -> bool {
        self.bearer_token.is_some()
    }

    /// Get the current rate limit state.
    pub fn rate_limit_state(&self) -> RateLimitState {
        let remaining = self.rate_limit_remaining.load(Ordering::SeqCst);
        let limit = self.rate_limit_limit.load(Ordering::SeqCst);
        let reset = self.rate_limit_reset.load(Ordering::SeqCst);
        RateLimitState {
            remaining: u64::try_from(remaining).ok(),
            limit: (limit > 0).then_some(limit),
            reset: (reset > 0).then_some(reset),
        }
    }

    /// GET a JSON API resource and deserialize it.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let request = self
            .request(url)
            .header(header::ACCEPT, NetworkConfig::GITHUB_ACCEPT)
            .timeout(NetworkConfig::REQUEST_TIMEOUT);

        let response = self.send(request, url).await?;
        response.json::<T>().await.map_err(|e| MarketError::Json {
            message: format!("Failed to parse response from {}: {}", url, e),
            source: None,
        })
    }

    /// GET a binary resource; the caller consumes the body stream.
    pub async fn get_stream(&self, url: &str) -> Result<Response> {
        let request = self.request(url);
        self.send(request, url).await
    }

    // Internal methods

    fn request(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MarketError::Timeout(format!("GET {} timed out", url))
            } else {
                MarketError::Network {
                    message: format!("GET {} failed: {}", url, e),
                    cause: Some(e.to_string()),
                }
            }
        })?;

        self.update_rate_limits(&response);
        self.check_response_status(response, url).await
    }

    fn update_rate_limits(&self, response: &Response) {
        let headers = response.headers();
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
        };

        if let Some(remaining) = read("X-RateLimit-Remaining") {
            self.rate_limit_remaining
                .store(i64::try_from(remaining).unwrap_or(i64::MAX), Ordering::SeqCst);
        }
        if let Some(limit) = read("X-RateLimit-Limit") {
            self.rate_limit_limit.store(limit, Ordering::SeqCst);
        }
        if let Some(reset) = read("X-RateLimit-Reset") {
            self.rate_limit_reset.store(reset, Ordering::SeqCst);
        }

        let state = self.rate_limit_state();
        if let (Some(remaining), Some(limit)) = (state.remaining, state.limit) {
            debug!("Rate limit: {}/{}", remaining, limit);
        }
    }

    async fn check_response_status(&self, response: Response, url: &str) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let rate_limit = self.rate_limit_state();
        if status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN && rate_limit.is_exhausted())
        {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .or_else(|| rate_limit.secs_until_reset());

            return Err(MarketError::RateLimited {
                service: extract_domain(url),
                retry_after_secs: retry_after,
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(MarketError::ArtifactApi {
            message: format!("GET {} returned {}: {}", url, status, error_message(&body)),
            status_code: Some(status.as_u16()),
        })
    }
}

/// Pull the `message` field out of a GitHub error body, falling back to the
/// first line of the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.lines().next().unwrap_or("").chars().take(200).collect())
}

/// Extract domain from a URL.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.host_str().unwrap_or("unknown").to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_exhausted() {
        let state = RateLimitState {
            remaining: Some(0),
            limit: Some(5000),
            reset: None,
        };
        assert!(state.is_exhausted());
        assert!(!RateLimitState::default().is_exhausted());
    }

    #[test]
    fn test_secs_until_reset() {
        let future = (chrono::Utc::now().timestamp() + 120) as u64;
        let state = RateLimitState {
            remaining: Some(0),
            limit: Some(60),
            reset: Some(future),
        };
        let secs = state.secs_until_reset().unwrap();
        assert!(secs > 100 && secs <= 120);

        let past = RateLimitState {
            reset: Some(1),
            ..Default::default()
        };
        assert_eq!(past.secs_until_reset(), None);
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://api.github.com/repos/foo/bar/actions/artifacts"),
            "api.github.com"
        );
        assert_eq!(extract_domain("invalid-url"), "unknown");
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"message":"Bad credentials","documentation_url":"x"}"#),
            "Bad credentials"
        );
        assert_eq!(error_message("upstream down\nmore"), "upstream down");
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = HttpClient::new(None).unwrap();
        assert!(!client.has_token());
        assert_eq!(client.rate_limit_state(), RateLimitState::default());

        let client = HttpClient::new(Some("  ".into())).unwrap();
        assert!(!client.has_token());
    }
}
