//! Core types for the ingestion service.

mod config;
mod post;
mod record;
mod sentiment;

pub use config::{AnalysisMode, ConfigError, IngestConfig, CONFIG_FILE_ENV, ENV_PREFIX};
pub use post::{RawPost, DELETED_AUTHOR};
pub use record::EnrichedPostRecord;
pub use sentiment::{
    AggregatedSentiment, Assessment, ChunkSentimentResult, OpinionAssessment, OverallSentiment,
};
