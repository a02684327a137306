//! Catalog service client: health probe and multipart flyer upload.

mod response;

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use response::{interpret_response, UploadResponse};

use crate::models::{Artifact, StoreInfo, UploadOutcome};
use crate::scrapers::{resolve_user_agent, RateLimiter};

/// Errors talking to the catalog outside of an upload.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog at {url} is unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("catalog health check at {url} returned HTTP {status}")]
    Unhealthy { url: String, status: u16 },
    #[error("failed to create catalog client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Client for the flyer catalog API.
#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    api_base: String,
    api_timeout: Duration,
    upload_timeout: Duration,
    rate_limiter: Option<RateLimiter>,
}

impl CatalogClient {
    /// `api_base` is the API prefix, e.g. `http://localhost:5000/api`.
    pub fn new(api_base: &str, api_timeout: Duration, upload_timeout: Duration) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(resolve_user_agent(None))
            .build()
            .map_err(CatalogError::Build)?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_timeout,
            upload_timeout,
            rate_limiter: None,
        })
    }

    /// Pace uploads through a shared limiter.
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn upload_url(&self) -> String {
        format!("{}/pdfs/upload", self.api_base)
    }

    /// Health lives at the service root, outside the `/api` prefix.
    pub fn health_url(&self) -> String {
        let root = self.api_base.strip_suffix("/api").unwrap_or(&self.api_base);
        format!("{}/health", root)
    }

    /// `GET /health` with the short API timeout.
    pub async fn health_check(&self) -> Result<(), CatalogError> {
        let url = self.health_url();
        let response = self
            .client
            .get(&url)
            .timeout(self.api_timeout)
            .send()
            .await
            .map_err(|source| CatalogError::Unreachable {
                url: url.clone(),
                source,
            })?;

        let status = response.status().as_u16();
        if status == 200 {
            debug!("Catalog healthy at {}", url);
            Ok(())
        } else {
            Err(CatalogError::Unhealthy { url, status })
        }
    }

    /// Upload one artifact with its metadata. Never errors: transport and
    /// protocol problems become `UploadOutcome::Failed`.
    pub async fn upload(&self, artifact: &Artifact, info: &StoreInfo, source: &str) -> UploadOutcome {
        let url = self.upload_url();

        let bytes = match tokio::fs::read(&artifact.path).await {
            Ok(b) => b,
            Err(e) => {
                return UploadOutcome::failed(format!(
                    "cannot read {}: {}",
                    artifact.path.display(),
                    e
                ))
            }
        };

        let part = match Part::bytes(bytes)
            .file_name(artifact.file_name().to_string())
            .mime_str("application/pdf")
        {
            Ok(p) => p,
            Err(e) => return UploadOutcome::failed(format!("cannot build upload: {}", e)),
        };

        let form = Form::new()
            .part("pdfs", part)
            .text("store", info.name.clone())
            .text("category", info.category.label())
            .text("location.cap", info.cap.clone())
            .text("source", source.to_string());

        if let Some(ref limiter) = self.rate_limiter {
            limiter.acquire(&url).await;
        }

        info!(
            "Uploading {} as {} ({}, {})",
            artifact.file_name(),
            info.name,
            info.category,
            info.cap
        );
        let response = match self
            .client
            .post(&url)
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Upload of {} failed: {}", artifact.file_name(), e);
                return UploadOutcome::failed(format!("upload to {} failed: {}", url, e));
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return UploadOutcome::failed(format!("failed to read catalog response: {}", e)),
        };

        let outcome = interpret_response(status, &body);
        debug!("Catalog answered {} for {}", outcome.label(), artifact.file_name());
        outcome
    }
}
