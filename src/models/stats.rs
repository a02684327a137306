//! Run statistics and the persisted run record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Starting,
    Discovering,
    Fetching,
    Ingesting,
    Completed,
    Aborted,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Discovering => "discovering",
            Self::Fetching => "fetching",
            Self::Ingesting => "ingesting",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped entry in the run's error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Counters accumulated over a run, plus the error log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub found: u64,
    pub downloaded: u64,
    pub skipped: u64,
    pub uploaded: u64,
    pub duplicates: u64,
    pub errors: u64,
    #[serde(skip)]
    pub error_log: Vec<ErrorEntry>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an error and keep its message.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors += 1;
        self.error_log.push(ErrorEntry {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    /// Fold another run's counters into this one.
    pub fn merge(&mut self, other: &RunStats) {
        self.found += other.found;
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.uploaded += other.uploaded;
        self.duplicates += other.duplicates;
        self.errors += other.errors;
        self.error_log.extend(other.error_log.iter().cloned());
    }
}

/// How a finished run is reported to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunOutcome {
    Succeeded,
    Partial,
    NothingFound,
    Aborted,
}

impl RunOutcome {
    pub fn classify(state: RunState, stats: &RunStats) -> Self {
        if state == RunState::Aborted {
            Self::Aborted
        } else if stats.found == 0 {
            Self::NothingFound
        } else if stats.errors == 0 {
            Self::Succeeded
        } else {
            Self::Partial
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Succeeded => 0,
            Self::Partial => 1,
            Self::NothingFound => 2,
            Self::Aborted => 3,
        }
    }

    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }
}

/// The JSON document written at the end of every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub source: String,
    pub state: RunState,
    pub stats: RunStats,
    pub error_log: Vec<ErrorEntry>,
}

impl RunRecord {
    pub fn new(run_id: &str, source: &str, state: RunState, stats: &RunStats) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
            source: source.to_string(),
            state,
            error_log: stats.error_log.clone(),
            stats: stats.clone(),
        }
    }
}
