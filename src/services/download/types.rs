//! Fetch failure taxonomy.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::scrapers::HttpError;

/// Why a candidate did not become an artifact.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport failure, timeout or non-success status.
    #[error("network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: HttpError,
    },
    /// Payload does not start with `%PDF`.
    #[error("{url} is not a PDF ({detected})")]
    NotAPdf { url: String, detected: String },
    /// Same bytes were already accepted during this run.
    #[error("{url} duplicates content already fetched this run ({fingerprint})")]
    DuplicateContent { url: String, fingerprint: String },
    /// Local write failed.
    #[error("failed to store {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Network { url, .. } | Self::NotAPdf { url, .. } | Self::DuplicateContent { url, .. } => {
                Some(url)
            }
            Self::Storage { .. } => None,
        }
    }
}

/// Human-readable guess at what a rejected payload actually is.
pub fn describe_payload(content: &[u8]) -> String {
    if content.is_empty() {
        return "empty body".to_string();
    }
    if let Some(kind) = infer::get(content) {
        return kind.mime_type().to_string();
    }

    let head = String::from_utf8_lossy(&content[..content.len().min(256)]).to_lowercase();
    let head = head.trim_start();
    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        "text/html".to_string()
    } else if head.starts_with("<?xml") {
        "text/xml".to_string()
    } else if head.starts_with('{') || head.starts_with('[') {
        "application/json".to_string()
    } else {
        "unrecognized content".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_payload() {
        assert_eq!(describe_payload(b""), "empty body");
        assert_eq!(
            describe_payload(b"  <!DOCTYPE html><html><body>Cookie consent</body></html>"),
            "text/html"
        );
        assert_eq!(describe_payload(b"{\"error\":true}"), "application/json");
        assert_eq!(describe_payload(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]), "image/png");
    }
}
