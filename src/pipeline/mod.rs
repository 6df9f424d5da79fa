//! The fetch, chunk, analyze, aggregate and publish pipeline.

mod enricher;
mod report;
mod runner;

pub use enricher::PostEnricher;
pub use report::{FailedSearch, IngestError, RunReport, RunRequest, StopReason};
pub use runner::{IngestPipeline, RunSettings};
