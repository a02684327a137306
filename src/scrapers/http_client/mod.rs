//! HTTP client shared by every request of a site run.

mod response;
mod user_agent;

pub use response::{parse_content_disposition_filename, HttpResponse};
pub use user_agent::{resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use super::rate_limiter::RateLimiter;

/// Errors from a single HTTP exchange.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("invalid header '{0}'")]
    InvalidHeader(String),
    #[error("failed to create HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl HttpError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_timeout())
    }
}

/// Source of page markup for discovery.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, HttpError>;
}

/// HTTP client with per-domain pacing and bounded timeouts.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    source_id: String,
    rate_limiter: RateLimiter,
    page_timeout: Duration,
    download_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client.
    /// - user_agent None: default flyerscout user agent
    /// - Some("impersonate"): real browser user agent
    /// - Some(custom): custom user agent string
    pub fn new(
        source_id: &str,
        headers: &BTreeMap<String, String>,
        user_agent_config: Option<&str>,
        rate_limiter: RateLimiter,
    ) -> Result<Self, HttpError> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HttpError::InvalidHeader(name.clone()))?;
            let value =
                HeaderValue::from_str(value).map_err(|_| HttpError::InvalidHeader(value.clone()))?;
            default_headers.insert(name, value);
        }

        let user_agent = resolve_user_agent(user_agent_config);
        let client = Client::builder()
            .user_agent(&user_agent)
            .default_headers(default_headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(HttpError::Build)?;

        Ok(Self {
            client,
            source_id: source_id.to_string(),
            rate_limiter,
            page_timeout: Duration::from_secs(20),
            download_timeout: Duration::from_secs(60),
        })
    }

    /// Override the page and download timeouts.
    pub fn with_timeouts(mut self, page: Duration, download: Duration) -> Self {
        self.page_timeout = page;
        self.download_timeout = download;
        self
    }

    /// Get the rate limiter for this client.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Paced GET. Non-success statuses are returned, not treated as errors.
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, HttpError> {
        let domain = self.rate_limiter.acquire(url).await;

        debug!("[{}] GET {}", self.source_id, url);
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| HttpError::Transport {
                url: url.to_string(),
                source,
            })?;

        if let Some(ref domain) = domain {
            self.rate_limiter
                .report_status(domain, response.status().as_u16())
                .await;
        }

        Ok(HttpResponse::from_response(url, response))
    }

    /// Get page content as text. Non-success statuses are errors.
    pub async fn get_text(&self, url: &str) -> Result<String, HttpError> {
        let response = self.get(url, self.page_timeout).await?.error_for_status()?;
        response.text().await
    }

    /// Download a document body with the download timeout.
    pub async fn get_document(&self, url: &str) -> Result<(Vec<u8>, Option<String>), HttpError> {
        let response = self
            .get(url, self.download_timeout)
            .await?
            .error_for_status()?;
        let filename = response.content_disposition_filename();
        let bytes = response.bytes().await?;
        Ok((bytes, filename))
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch_page(&self, url: &str) -> Result<String, HttpError> {
        self.get_text(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_header_name() {
        let mut headers = BTreeMap::new();
        headers.insert("Bad Header".to_string(), "x".to_string());
        let result = HttpClient::new("test", &headers, None, RateLimiter::new());
        assert!(matches!(result, Err(HttpError::InvalidHeader(_))));
    }

    #[test]
    fn test_builds_with_site_headers() {
        let mut headers = BTreeMap::new();
        headers.insert("Accept-Language".to_string(), "it-IT".to_string());
        assert!(HttpClient::new("test", &headers, Some("impersonate"), RateLimiter::new()).is_ok());
    }

    #[test]
    fn test_status_error_message() {
        let err = HttpError::Status {
            url: "https://x.it/a.pdf".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "https://x.it/a.pdf returned HTTP 404");
        assert!(!err.is_timeout());
    }
}
