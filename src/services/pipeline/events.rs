//! Progress events emitted by a pipeline run.

use std::path::PathBuf;

use crate::models::{RunState, StrategyKind, UploadOutcome};

/// Events emitted while a site is processed. Consumers are optional and
/// a closed channel never affects the run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// The run moved to a new state.
    StateChanged { site: String, state: RunState },
    /// A seed page was fetched and scanned.
    SeedScanned {
        url: String,
        added: usize,
        secondary_pages: usize,
    },
    /// A seed page could not be fetched.
    SeedFailed { url: String, error: String },
    /// Discovery finished with this many distinct candidates.
    CandidatesFound { total: usize },
    /// A candidate download is starting.
    DownloadStarted {
        url: String,
        strategy: StrategyKind,
    },
    /// A candidate became an artifact on disk.
    Downloaded {
        url: String,
        path: PathBuf,
        size: u64,
    },
    /// A candidate was dropped without counting as an error.
    Skipped { url: String, reason: String },
    /// A candidate failed and counted as an error.
    Failed { url: String, error: String },
    /// Upload finished for an artifact.
    Uploaded {
        file: String,
        store: String,
        outcome: UploadOutcome,
    },
}
