//! Upload of PDFs already on disk, without discovery.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::{
    classify_rejection, count_rejection, count_upload, inferencer_for, PipelineError,
    Rejection, RunReport,
};
use crate::config::Settings;
use crate::models::{Artifact, RunRecord, RunState, RunStats};
use crate::scrapers::{RateLimitConfig, RateLimiter, SiteProfile};
use crate::services::catalog::CatalogClient;
use crate::services::download::{ContentValidator, FetchError};
use crate::storage::{write_run_record, INGEST_STATS_FILE};

/// Source tag used when no site is given.
const LOCAL_SOURCE: &str = "local";

/// `*.pdf` files directly inside `dir`, sorted by name.
async fn pdf_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Upload every PDF in `dir` to the catalog.
///
/// Files are signature-checked and deduplicated by fingerprint like
/// downloads are. The record goes to `dir/integration_stats.json`.
pub async fn ingest_directory(
    dir: &Path,
    profile: Option<&SiteProfile>,
    settings: &Settings,
    health_check: bool,
) -> Result<RunReport, PipelineError> {
    let source = profile.map_or(LOCAL_SOURCE, |p| p.id.as_str());
    let run_id = uuid::Uuid::new_v4().to_string();
    let delay = profile.map_or(settings.request_delay, |p| p.request_delay);
    let catalog = CatalogClient::new(
        &settings.catalog_url,
        settings.timeouts.api,
        settings.timeouts.upload,
    )
    .map_err(PipelineError::Catalog)?
    .with_rate_limiter(RateLimiter::with_config(RateLimitConfig::with_base_delay(delay)));
    let inferencer = inferencer_for(profile, &settings.policy);

    let mut stats = RunStats::new();
    let mut state = RunState::Starting;
    let mut fatal = None;

    if health_check {
        if let Err(e) = catalog.health_check().await {
            fatal = Some(PipelineError::CatalogUnreachable(e).to_string());
        }
    }

    let files = match fatal {
        Some(_) => Vec::new(),
        None => match pdf_files(dir).await {
            Ok(files) => files,
            Err(e) => {
                fatal = Some(format!("cannot list {}: {}", dir.display(), e));
                Vec::new()
            }
        },
    };

    if fatal.is_none() {
        state = RunState::Ingesting;
        stats.found = files.len() as u64;
        info!("Ingesting {} PDFs from {}", files.len(), dir.display());

        let mut validator = ContentValidator::new();
        for path in &files {
            let label = path.display().to_string();
            let content = match tokio::fs::read(path).await {
                Ok(c) => c,
                Err(source) => {
                    let err = FetchError::Storage {
                        path: path.clone(),
                        source,
                    };
                    count_rejection(&mut stats, &Rejection::Error(err.to_string()));
                    continue;
                }
            };

            let fingerprint = match validator.check(&label, &content) {
                Ok(fp) => fp,
                Err(e) => {
                    count_rejection(&mut stats, &classify_rejection(&e, &settings.policy));
                    continue;
                }
            };
            validator.record(fingerprint);

            let artifact = Artifact::new(path.clone(), &content, label);
            let info = inferencer.infer(artifact.file_name(), "");
            let outcome = catalog.upload(&artifact, &info, source).await;
            count_upload(&mut stats, artifact.file_name(), &outcome);
        }
        state = RunState::Completed;
    }

    if let Some(ref message) = fatal {
        error!("Ingest of {} aborted: {}", dir.display(), message);
        stats.record_error(message.clone());
        state = RunState::Aborted;
    }

    let record = RunRecord::new(&run_id, source, state, &stats);
    let record_path = if dir.is_dir() {
        match write_run_record(dir, INGEST_STATS_FILE, &record) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failed to write {} in {}: {}", INGEST_STATS_FILE, dir.display(), e);
                None
            }
        }
    } else {
        None
    };

    Ok(RunReport {
        run_id,
        site: source.to_string(),
        state,
        stats,
        record_path,
        fatal,
    })
}
