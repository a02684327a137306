//! Downloaded flyer documents.
//!
//! An artifact only exists for content that passed the PDF signature
//! check. The file on disk outlives the run; this record does not.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Leading bytes of every PDF file.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// A validated PDF stored on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Path to the stored file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// SHA-256 of the raw bytes, lowercase hex.
    pub fingerprint: String,
    /// URL the bytes were fetched from (or the local path for ingested files).
    pub source_url: String,
}

impl Artifact {
    pub fn new(path: PathBuf, content: &[u8], source_url: impl Into<String>) -> Self {
        Self {
            path,
            size: content.len() as u64,
            fingerprint: Self::compute_fingerprint(content),
            source_url: source_url.into(),
        }
    }

    /// Compute SHA-256 hash of content.
    pub fn compute_fingerprint(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    /// Whether `content` starts with the PDF signature.
    pub fn has_pdf_signature(content: &[u8]) -> bool {
        content.starts_with(PDF_MAGIC)
    }

    /// File name component of the stored path.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
