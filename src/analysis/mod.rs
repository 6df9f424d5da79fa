//! Sentiment analysis: backend seam, per-chunk adapter and aggregation.

mod aggregator;
mod analyzer;
mod backend;
mod text_analytics;

pub use aggregator::aggregate;
pub use analyzer::SentimentAnalyzer;
pub use backend::{
    AnalysisError, DocumentSentiment, MinedOpinion, OpinionTarget, SentenceOpinions,
    SentimentBackend,
};
pub use text_analytics::TextAnalyticsClient;
