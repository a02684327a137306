//! Data models for flyerscout.

mod artifact;
mod candidate;
mod outcome;
mod stats;
mod store;

pub use artifact::{Artifact, PDF_MAGIC};
pub use candidate::{Candidate, CandidateSet, StrategyKind};
pub use outcome::UploadOutcome;
pub use stats::{ErrorEntry, RunOutcome, RunRecord, RunState, RunStats};
pub use store::{Category, StoreInfo};
