//! Forum Sentiment Library
//!
//! Searches forums for terms, enriches every matching post with sentiment
//! and opinion signals from its text and comment thread, and publishes the
//! enriched records to an event stream with at-least-once delivery.

pub mod analysis;
pub mod api;
pub mod chunkers;
pub mod messaging;
pub mod pipeline;
pub mod schedule;
pub mod secrets;
pub mod source;
pub mod types;

pub use analysis::{SentimentAnalyzer, SentimentBackend};
pub use chunkers::TextChunker;
pub use messaging::{EventPublisher, StreamSink};
pub use pipeline::{IngestPipeline, PostEnricher, RunReport, RunRequest};
pub use source::PostSource;
pub use types::{AggregatedSentiment, EnrichedPostRecord, IngestConfig, RawPost};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::analysis::*;
    pub use crate::chunkers::*;
    pub use crate::messaging::*;
    pub use crate::pipeline::*;
    pub use crate::secrets::{SecretProvider, ServiceSecrets};
    pub use crate::source::*;
    pub use crate::types::*;
}

/// Default maximum chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 5120;

/// Default per-forum result limit in opinion-mining mode
pub const DEFAULT_OPINION_POST_LIMIT: usize = 20;

/// Default per-forum result limit in simple-sentiment mode
pub const DEFAULT_SIMPLE_POST_LIMIT: usize = 10;

/// Default per-batch payload limit of the stream sink (1MB)
pub const DEFAULT_MAX_BATCH_BYTES: usize = 1024 * 1024;

/// Score reported when there is nothing to analyze
pub const NEUTRAL_SCORE: f64 = 0.5;
