//! Service layer: the pipeline stages and the orchestrator sequencing them.
//!
//! Services are separated from UI concerns and report progress through
//! events, so the CLI and tests drive them the same way.

pub mod catalog;
pub mod download;
pub mod metadata;
pub mod pipeline;

pub use catalog::{CatalogClient, CatalogError};
pub use download::{ContentValidator, DocumentFetcher, FetchError};
pub use metadata::{LocationPolicy, MetadataInferencer};
pub use pipeline::{
    ingest_directory, Pipeline, PipelineError, PipelineEvent, PipelineOptions, RunReport,
};
