//! Candidate download and validation.
//!
//! Turns candidate URLs into artifacts: bounded-timeout GET, PDF signature
//! check, run-scoped fingerprint dedup, then a single write to the site
//! directory. Nothing is written for rejected content.

mod types;

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info, warn};

pub use types::{describe_payload, FetchError};

use crate::models::{Artifact, Candidate};
use crate::scrapers::HttpClient;
use crate::storage::{pdf_filename, ArtifactStore, StoredFile};

/// Run-scoped content checks shared by downloads and local ingestion.
#[derive(Debug, Default)]
pub struct ContentValidator {
    seen: HashSet<String>,
}

impl ContentValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the PDF signature and fingerprint, returning the fingerprint.
    /// The fingerprint is not recorded until [`ContentValidator::record`].
    pub fn check(&self, url: &str, content: &[u8]) -> Result<String, FetchError> {
        if !Artifact::has_pdf_signature(content) {
            return Err(FetchError::NotAPdf {
                url: url.to_string(),
                detected: describe_payload(content),
            });
        }

        let fingerprint = Artifact::compute_fingerprint(content);
        if self.seen.contains(&fingerprint) {
            return Err(FetchError::DuplicateContent {
                url: url.to_string(),
                fingerprint,
            });
        }
        Ok(fingerprint)
    }

    pub fn record(&mut self, fingerprint: String) {
        self.seen.insert(fingerprint);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Downloads candidates for one site run.
pub struct DocumentFetcher {
    client: HttpClient,
    store: ArtifactStore,
    source_tag: String,
    validator: ContentValidator,
}

impl DocumentFetcher {
    pub fn new(client: HttpClient, store: ArtifactStore, source_tag: &str) -> Self {
        Self {
            client,
            store,
            source_tag: source_tag.to_string(),
            validator: ContentValidator::new(),
        }
    }

    /// Download one candidate and turn it into an artifact.
    pub async fn fetch(&mut self, candidate: &Candidate) -> Result<Artifact, FetchError> {
        debug!("Downloading {} (via {})", candidate.url, candidate.strategy);
        let (content, disposition) = self
            .client
            .get_document(&candidate.url)
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    warn!("Download of {} timed out, not retrying", candidate.url);
                }
                FetchError::Network {
                    url: candidate.url.clone(),
                    source,
                }
            })?;

        self.accept(&candidate.url, &content, disposition.as_deref())
    }

    /// Validate downloaded bytes and store them.
    pub fn accept(
        &mut self,
        url: &str,
        content: &[u8],
        disposition: Option<&str>,
    ) -> Result<Artifact, FetchError> {
        let fingerprint = self.validator.check(url, content)?;

        let filename = pdf_filename(url, disposition, &self.source_tag, Utc::now());
        let stored = self
            .store
            .store(&filename, content, &fingerprint)
            .map_err(|source| FetchError::Storage {
                path: self.store.dir().join(&filename),
                source,
            })?;

        match &stored {
            StoredFile::Written(path) => info!("Saved {} ({} bytes)", path.display(), content.len()),
            StoredFile::AlreadyPresent(path) => {
                debug!("{} already on disk, not rewritten", path.display())
            }
        }

        self.validator.record(fingerprint);
        Ok(Artifact::new(stored.into_path(), content, url))
    }

    /// Distinct documents accepted so far.
    pub fn accepted(&self) -> usize {
        self.validator.len()
    }
}
