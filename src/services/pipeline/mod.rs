//! Run orchestration for one site.
//!
//! A run moves `Starting -> Discovering -> Fetching -> Ingesting ->
//! Completed`, or to `Aborted` on a fatal error or interrupt. Every stage
//! is sequential; the shared [`HttpClient`] paces requests per host. The
//! run record is written whatever the outcome.

mod events;
mod ingest;

use std::future::Future;
use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub use events::PipelineEvent;
pub use ingest::ingest_directory;

use super::catalog::{CatalogClient, CatalogError};
use super::download::{DocumentFetcher, FetchError};
use super::metadata::{LocationPolicy, MetadataInferencer};
use crate::config::{NotAPdfPolicy, PolicyConfig, Settings};
use crate::models::{
    Artifact, Candidate, RunOutcome, RunRecord, RunState, RunStats, UploadOutcome,
};
use crate::scrapers::{
    CandidateExtractor, DiscoveryState, HttpClient, HttpError, PageFetcher, RateLimitConfig,
    RateLimiter, SiteProfile,
};
use crate::storage::{site_dir, write_run_record, ArtifactStore, SCRAPE_STATS_FILE};

/// Fatal pipeline errors. Anything per-candidate is counted, not raised.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("catalog unreachable, run aborted before discovery: {0}")]
    CatalogUnreachable(#[source] CatalogError),
    #[error("none of the {0} seed pages could be fetched")]
    NoSeedReachable(usize),
    #[error("failed to create HTTP client: {0}")]
    Client(#[from] HttpError),
    #[error("failed to create catalog client: {0}")]
    Catalog(#[source] CatalogError),
    #[error("run interrupted")]
    Interrupted,
}

/// Switches for one run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Upload artifacts to the catalog; false means download only.
    pub upload: bool,
    /// Probe the catalog before discovery (only when uploading).
    pub health_check: bool,
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            upload: true,
            health_check: settings.health_check,
        }
    }

    pub fn download_only() -> Self {
        Self {
            upload: false,
            health_check: false,
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub site: String,
    pub state: RunState,
    pub stats: RunStats,
    /// Where the run record was written, when writing succeeded.
    pub record_path: Option<PathBuf>,
    /// The fatal error that aborted the run.
    pub fatal: Option<String>,
}

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome::classify(self.state, &self.stats)
    }
}

/// State and counters threaded through the stages.
#[derive(Debug)]
struct RunProgress {
    state: RunState,
    stats: RunStats,
}

/// How a rejected candidate is counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Rejection {
    Skipped(String),
    Error(String),
}

/// Bucket a fetch failure according to policy.
pub(crate) fn classify_rejection(err: &FetchError, policy: &PolicyConfig) -> Rejection {
    match err {
        FetchError::NotAPdf { .. } => match policy.not_a_pdf {
            NotAPdfPolicy::Skip => Rejection::Skipped(err.to_string()),
            NotAPdfPolicy::Error => Rejection::Error(err.to_string()),
        },
        FetchError::DuplicateContent { .. } => Rejection::Skipped(err.to_string()),
        FetchError::Network { .. } | FetchError::Storage { .. } => Rejection::Error(err.to_string()),
    }
}

/// Apply a rejection to the counters.
pub(crate) fn count_rejection(stats: &mut RunStats, rejection: &Rejection) {
    match rejection {
        Rejection::Skipped(reason) => {
            debug!("Skipped: {}", reason);
            stats.skipped += 1;
        }
        Rejection::Error(message) => {
            warn!("{}", message);
            stats.record_error(message.clone());
        }
    }
}

/// Apply an upload verdict to the counters.
pub(crate) fn count_upload(stats: &mut RunStats, file: &str, outcome: &UploadOutcome) {
    match outcome {
        UploadOutcome::Created { id, .. } => {
            stats.uploaded += 1;
            info!(
                "Uploaded {} (flyer {})",
                file,
                id.as_deref().unwrap_or("unknown")
            );
        }
        UploadOutcome::Duplicate { .. } => {
            stats.duplicates += 1;
            info!("{} already in catalog", file);
        }
        UploadOutcome::Failed { message } => {
            warn!("Upload of {} rejected: {}", file, message);
            stats.record_error(format!("upload of {} failed: {}", file, message));
        }
    }
}

/// Metadata inferencer for a site, honoring the fallback location policy.
pub(crate) fn inferencer_for(profile: Option<&SiteProfile>, policy: &PolicyConfig) -> MetadataInferencer {
    let inferencer = match profile {
        Some(profile) => MetadataInferencer::for_profile(profile),
        None => MetadataInferencer::new(),
    };
    let has_fixed_cap = profile.is_some_and(|p| p.default_cap.is_some());
    match (&policy.fallback_cap, has_fixed_cap) {
        (Some(cap), false) => inferencer.with_location(LocationPolicy::Fixed(cap.clone())),
        _ => inferencer,
    }
}

/// Full discovery-to-ingestion run for one site.
pub struct Pipeline {
    profile: SiteProfile,
    client: HttpClient,
    catalog: CatalogClient,
    extractor: CandidateExtractor,
    inferencer: MetadataInferencer,
    fetcher: DocumentFetcher,
    data_dir: PathBuf,
    policy: PolicyConfig,
    options: PipelineOptions,
    events: Option<mpsc::Sender<PipelineEvent>>,
    run_id: String,
}

impl Pipeline {
    pub fn new(
        profile: SiteProfile,
        settings: &Settings,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        let rate_limiter =
            RateLimiter::with_config(RateLimitConfig::with_base_delay(profile.request_delay));
        let client = HttpClient::new(
            &profile.id,
            &profile.headers,
            profile.user_agent.as_deref(),
            rate_limiter.clone(),
        )?
        .with_timeouts(settings.timeouts.page, settings.timeouts.download);

        let catalog = CatalogClient::new(
            &settings.catalog_url,
            settings.timeouts.api,
            settings.timeouts.upload,
        )
        .map_err(PipelineError::Catalog)?
        .with_rate_limiter(rate_limiter);

        let store = ArtifactStore::new(site_dir(&settings.data_dir, &profile.id));
        let fetcher = DocumentFetcher::new(client.clone(), store, &profile.id);

        Ok(Self {
            extractor: CandidateExtractor::for_profile(&profile),
            inferencer: inferencer_for(Some(&profile), &settings.policy),
            client,
            catalog,
            fetcher,
            data_dir: settings.data_dir.clone(),
            policy: settings.policy.clone(),
            options,
            events: None,
            run_id: uuid::Uuid::new_v4().to_string(),
            profile,
        })
    }

    /// Send progress events to `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Run to completion.
    pub async fn run(self) -> RunReport {
        self.run_with_shutdown(std::future::pending::<()>()).await
    }

    /// Run until done or until `shutdown` resolves. Counters gathered so far
    /// are persisted either way.
    pub async fn run_with_shutdown<S>(mut self, shutdown: S) -> RunReport
    where
        S: Future<Output = ()>,
    {
        info!(
            "[{}] Starting run {} ({} seeds)",
            self.profile.id,
            self.run_id,
            self.profile.seeds.len()
        );
        let mut progress = RunProgress {
            state: RunState::Starting,
            stats: RunStats::new(),
        };

        let result = tokio::select! {
            biased;
            _ = shutdown => Err(PipelineError::Interrupted),
            result = self.execute(&mut progress) => result,
        };

        let fatal = match result {
            Ok(()) => None,
            Err(e) => {
                error!("[{}] Run aborted: {}", self.profile.id, e);
                progress.stats.record_error(e.to_string());
                self.set_state(&mut progress, RunState::Aborted).await;
                Some(e.to_string())
            }
        };

        self.log_pacing().await;

        let record = RunRecord::new(&self.run_id, &self.profile.id, progress.state, &progress.stats);
        let dir = site_dir(&self.data_dir, &self.profile.id);
        let record_path = match write_run_record(&dir, SCRAPE_STATS_FILE, &record) {
            Ok(path) => {
                debug!("Run record written to {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!("Failed to write run record in {}: {}", dir.display(), e);
                None
            }
        };

        RunReport {
            run_id: self.run_id,
            site: self.profile.id,
            state: progress.state,
            stats: progress.stats,
            record_path,
            fatal,
        }
    }

    /// Discovery only: fetch seeds and return the candidates, nothing downloaded.
    pub async fn discover_only(&mut self) -> Result<(Vec<Candidate>, RunStats), PipelineError> {
        let mut progress = RunProgress {
            state: RunState::Starting,
            stats: RunStats::new(),
        };
        let candidates = self.discover(&mut progress).await?;
        Ok((candidates, progress.stats))
    }

    async fn execute(&mut self, progress: &mut RunProgress) -> Result<(), PipelineError> {
        if self.options.upload && self.options.health_check {
            self.catalog
                .health_check()
                .await
                .map_err(PipelineError::CatalogUnreachable)?;
            info!("Catalog reachable at {}", self.catalog.health_url());
        }

        let candidates = self.discover(progress).await?;
        let artifacts = self.fetch_all(progress, &candidates).await;

        if self.options.upload {
            self.ingest_all(progress, &artifacts).await;
        } else {
            debug!("Download-only run, {} artifacts kept on disk", artifacts.len());
        }

        self.set_state(progress, RunState::Completed).await;
        info!(
            "[{}] Completed: found {}, downloaded {}, uploaded {}, duplicates {}, errors {}",
            self.profile.id,
            progress.stats.found,
            progress.stats.downloaded,
            progress.stats.uploaded,
            progress.stats.duplicates,
            progress.stats.errors
        );
        Ok(())
    }

    async fn discover(&mut self, progress: &mut RunProgress) -> Result<Vec<Candidate>, PipelineError> {
        self.set_state(progress, RunState::Discovering).await;

        let depth = u32::from(self.profile.follow_secondary_pages);
        let mut state = DiscoveryState::new();
        let mut failed_seeds = 0;

        for seed in &self.profile.seeds {
            let html = match self.client.fetch_page(seed).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("[{}] Seed {} failed: {}", self.profile.id, seed, e);
                    progress
                        .stats
                        .record_error(format!("seed {} failed: {}", seed, e));
                    failed_seeds += 1;
                    emit(
                        &self.events,
                        PipelineEvent::SeedFailed {
                            url: seed.clone(),
                            error: e.to_string(),
                        },
                    )
                    .await;
                    continue;
                }
            };

            let report = self
                .extractor
                .discover(&html, seed, depth, &self.client, &mut state)
                .await;
            for (page, reason) in &report.failed_pages {
                progress
                    .stats
                    .record_error(format!("secondary page {} failed: {}", page, reason));
            }
            info!(
                "[{}] {} yielded {} candidates ({} secondary pages)",
                self.profile.id,
                seed,
                report.added,
                report.secondary_pages.len()
            );
            emit(
                &self.events,
                PipelineEvent::SeedScanned {
                    url: seed.clone(),
                    added: report.added,
                    secondary_pages: report.secondary_pages.len(),
                },
            )
            .await;
        }

        if failed_seeds == self.profile.seeds.len() {
            return Err(PipelineError::NoSeedReachable(failed_seeds));
        }

        let candidates = state.candidates.into_vec();
        progress.stats.found = candidates.len() as u64;
        emit(
            &self.events,
            PipelineEvent::CandidatesFound {
                total: candidates.len(),
            },
        )
        .await;
        Ok(candidates)
    }

    async fn fetch_all(&mut self, progress: &mut RunProgress, candidates: &[Candidate]) -> Vec<Artifact> {
        self.set_state(progress, RunState::Fetching).await;
        let mut artifacts = Vec::new();

        for candidate in candidates {
            emit(
                &self.events,
                PipelineEvent::DownloadStarted {
                    url: candidate.url.clone(),
                    strategy: candidate.strategy,
                },
            )
            .await;

            match self.fetcher.fetch(candidate).await {
                Ok(artifact) => {
                    progress.stats.downloaded += 1;
                    emit(
                        &self.events,
                        PipelineEvent::Downloaded {
                            url: candidate.url.clone(),
                            path: artifact.path.clone(),
                            size: artifact.size,
                        },
                    )
                    .await;
                    artifacts.push(artifact);
                }
                Err(e) => {
                    let rejection = classify_rejection(&e, &self.policy);
                    count_rejection(&mut progress.stats, &rejection);
                    let event = match rejection {
                        Rejection::Skipped(reason) => PipelineEvent::Skipped {
                            url: candidate.url.clone(),
                            reason,
                        },
                        Rejection::Error(error) => PipelineEvent::Failed {
                            url: candidate.url.clone(),
                            error,
                        },
                    };
                    emit(&self.events, event).await;
                }
            }
        }

        debug!(
            "[{}] {} distinct documents accepted",
            self.profile.id,
            self.fetcher.accepted()
        );
        artifacts
    }

    async fn ingest_all(&mut self, progress: &mut RunProgress, artifacts: &[Artifact]) {
        self.set_state(progress, RunState::Ingesting).await;

        for artifact in artifacts {
            let info = self
                .inferencer
                .infer(artifact.file_name(), &artifact.source_url);
            let outcome = self.catalog.upload(artifact, &info, &self.profile.id).await;
            count_upload(&mut progress.stats, artifact.file_name(), &outcome);
            emit(
                &self.events,
                PipelineEvent::Uploaded {
                    file: artifact.file_name().to_string(),
                    store: info.name,
                    outcome,
                },
            )
            .await;
        }
    }

    /// Per-host request counts and backoff, for the verbose summary.
    async fn log_pacing(&self) {
        for (domain, stats) in self.client.rate_limiter().get_stats().await {
            if stats.rate_limit_hits > 0 {
                warn!(
                    "[{}] {} rate limited {} times in {} requests, delay now {:?}",
                    self.profile.id, domain, stats.rate_limit_hits, stats.total_requests, stats.current_delay
                );
            } else {
                info!(
                    "[{}] {}: {} requests, delay {:?}",
                    self.profile.id, domain, stats.total_requests, stats.current_delay
                );
            }
        }
    }

    async fn set_state(&self, progress: &mut RunProgress, state: RunState) {
        debug!("[{}] {} -> {}", self.profile.id, progress.state, state);
        progress.state = state;
        emit(
            &self.events,
            PipelineEvent::StateChanged {
                site: self.profile.id.clone(),
                state,
            },
        )
        .await;
    }
}

async fn emit(events: &Option<mpsc::Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_a_pdf() -> FetchError {
        FetchError::NotAPdf {
            url: "https://x.it/vol.pdf".into(),
            detected: "text/html".into(),
        }
    }

    #[test]
    fn test_not_a_pdf_follows_policy() {
        let mut policy = PolicyConfig::default();
        assert!(matches!(
            classify_rejection(&not_a_pdf(), &policy),
            Rejection::Skipped(_)
        ));

        policy.not_a_pdf = NotAPdfPolicy::Error;
        assert!(matches!(
            classify_rejection(&not_a_pdf(), &policy),
            Rejection::Error(_)
        ));
    }

    #[test]
    fn test_duplicate_content_is_never_an_error() {
        let policy = PolicyConfig {
            not_a_pdf: NotAPdfPolicy::Error,
            fallback_cap: None,
        };
        let dup = FetchError::DuplicateContent {
            url: "https://x.it/b.pdf".into(),
            fingerprint: "ab".into(),
        };
        let mut stats = RunStats::new();
        count_rejection(&mut stats, &classify_rejection(&dup, &policy));
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.errors, 0);
    }

    #[test]
    fn test_network_errors_are_counted() {
        let err = FetchError::Network {
            url: "https://x.it/c.pdf".into(),
            source: HttpError::Status {
                url: "https://x.it/c.pdf".into(),
                status: 404,
            },
        };
        let mut stats = RunStats::new();
        count_rejection(&mut stats, &classify_rejection(&err, &PolicyConfig::default()));
        assert_eq!(stats.errors, 1);
        assert!(stats.error_log[0].message.contains("c.pdf"));
    }

    #[test]
    fn test_upload_counting() {
        let mut stats = RunStats::new();
        count_upload(
            &mut stats,
            "a.pdf",
            &UploadOutcome::Created {
                id: Some("f1".into()),
                message: None,
            },
        );
        count_upload(&mut stats, "b.pdf", &UploadOutcome::Duplicate { message: None });
        count_upload(&mut stats, "c.pdf", &UploadOutcome::failed("HTTP 500"));
        assert_eq!((stats.uploaded, stats.duplicates, stats.errors), (1, 1, 1));
        assert!(stats.error_log[0].message.contains("c.pdf"));
    }

    #[test]
    fn test_fallback_cap_only_without_site_cap() {
        let policy = PolicyConfig {
            not_a_pdf: NotAPdfPolicy::Skip,
            fallback_cap: Some("20100".into()),
        };
        let info = inferencer_for(None, &policy).infer("x.pdf", "");
        assert_eq!(info.cap, "20100");

        let settings = Settings::default();
        let mersi = crate::scrapers::builtin_sites()
            .remove("mersi")
            .unwrap()
            .into_profile("mersi", &settings)
            .unwrap();
        let info = inferencer_for(Some(&mersi), &policy).infer("x.pdf", "");
        assert_eq!(info.cap, "00000");
    }

    #[tokio::test]
    async fn test_unreachable_catalog_aborts_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::with_data_dir(dir.path().to_path_buf());
        settings.catalog_url = "http://127.0.0.1:9/api".into();
        settings.timeouts.api = std::time::Duration::from_millis(500);

        let profile = crate::scrapers::SiteConfig {
            seeds: vec!["http://127.0.0.1:9/volantini".into()],
            ..Default::default()
        }
        .into_profile("test", &settings)
        .unwrap();

        let pipeline =
            Pipeline::new(profile, &settings, PipelineOptions::from_settings(&settings)).unwrap();
        let report = pipeline.run().await;

        assert_eq!(report.state, RunState::Aborted);
        assert_eq!(report.outcome(), RunOutcome::Aborted);
        assert_eq!(report.stats.found, 0);
        assert!(report.fatal.unwrap().contains("catalog unreachable"));

        let path = report.record_path.unwrap();
        assert_eq!(path, dir.path().join("test").join(SCRAPE_STATS_FILE));
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["state"], "aborted");
        assert_eq!(value["stats"]["errors"], 1);
    }

    #[tokio::test]
    async fn test_interrupt_persists_partial_stats() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path().to_path_buf());
        let profile = crate::scrapers::SiteConfig {
            seeds: vec!["http://127.0.0.1:9/volantini".into()],
            ..Default::default()
        }
        .into_profile("test", &settings)
        .unwrap();

        let pipeline = Pipeline::new(profile, &settings, PipelineOptions::download_only()).unwrap();
        let report = pipeline.run_with_shutdown(async {}).await;

        assert_eq!(report.state, RunState::Aborted);
        assert_eq!(report.fatal.as_deref(), Some("run interrupted"));
        assert!(report.record_path.unwrap().exists());
    }
}
