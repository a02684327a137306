//! Storage helpers for flyer files and run records on disk.
//!
//! Layout: `{data_dir}/{site_id}/{filename}.pdf`, with the latest run
//! record next to the files.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{Artifact, RunRecord};

/// File name of the per-site record written by scrape runs.
pub const SCRAPE_STATS_FILE: &str = "scraping_stats.json";
/// File name of the record written when ingesting a local directory.
pub const INGEST_STATS_FILE: &str = "integration_stats.json";

const MAX_STEM_CHARS: usize = 100;

/// Directory holding one site's files.
pub fn site_dir(data_dir: &Path, site_id: &str) -> PathBuf {
    data_dir.join(sanitize_filename(site_id))
}

/// Make a string safe to use as a file name.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        return "document".to_string();
    }

    // Only the stem is shortened; the extension must survive.
    match trimmed.rsplit_once('.') {
        Some((stem, ext)) if is_short_extension(ext) => {
            let stem: String = stem.chars().take(MAX_STEM_CHARS).collect();
            format!("{}.{}", stem.trim_end_matches(['_', '.']), ext)
        }
        _ => trimmed.chars().take(MAX_STEM_CHARS).collect(),
    }
}

fn is_short_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

fn is_pdf_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// Last path segment of a URL, percent-decoded, if it names a PDF.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(segment).ok()?;
    is_pdf_name(&decoded).then(|| sanitize_filename(&decoded))
}

/// Generated name for documents that carry no usable name.
pub fn fallback_filename(source_tag: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}_volantino_{}.pdf",
        sanitize_filename(source_tag),
        now.timestamp()
    )
}

/// Pick a file name: URL segment, then Content-Disposition, then generated.
pub fn pdf_filename(
    url: &str,
    disposition: Option<&str>,
    source_tag: &str,
    now: DateTime<Utc>,
) -> String {
    filename_from_url(url)
        .or_else(|| {
            disposition
                .filter(|name| is_pdf_name(name))
                .map(sanitize_filename)
        })
        .unwrap_or_else(|| fallback_filename(source_tag, now))
}

/// Append the first eight fingerprint characters to a file stem.
pub fn disambiguated_filename(filename: &str, fingerprint: &str) -> String {
    let short = &fingerprint[..fingerprint.len().min(8)];
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{}.{}", stem, short, ext),
        None => format!("{}-{}", filename, short),
    }
}

/// Where a document's bytes ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredFile {
    /// Bytes were written to a new file.
    Written(PathBuf),
    /// A file with identical content was already there; nothing written.
    AlreadyPresent(PathBuf),
}

impl StoredFile {
    pub fn path(&self) -> &Path {
        match self {
            Self::Written(p) | Self::AlreadyPresent(p) => p,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Self::Written(p) | Self::AlreadyPresent(p) => p,
        }
    }
}

/// Writes validated documents into one site directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store content under `filename`, or under a fingerprint-suffixed name
    /// when a different file already holds that name.
    pub fn store(&self, filename: &str, content: &[u8], fingerprint: &str) -> io::Result<StoredFile> {
        std::fs::create_dir_all(&self.dir)?;

        for candidate in [
            filename.to_string(),
            disambiguated_filename(filename, fingerprint),
        ] {
            let path = self.dir.join(&candidate);
            if !path.exists() {
                std::fs::write(&path, content)?;
                debug!("Stored {} ({} bytes)", path.display(), content.len());
                return Ok(StoredFile::Written(path));
            }
            if Artifact::compute_fingerprint(&std::fs::read(&path)?) == fingerprint {
                return Ok(StoredFile::AlreadyPresent(path));
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!(
                "{} and its fingerprinted variant hold different content",
                filename
            ),
        ))
    }
}

/// Write a run record as pretty JSON, replacing any previous one.
pub fn write_run_record(dir: &Path, file_name: &str, record: &RunRecord) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    let json = serde_json::to_string_pretty(record).map_err(io::Error::other)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
