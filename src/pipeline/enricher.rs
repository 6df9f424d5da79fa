//! Turns one fetched post into a publish-ready record.

use tracing::{info, instrument};

use crate::analysis::SentimentAnalyzer;
use crate::types::{EnrichedPostRecord, RawPost};

/// Builds enriched records: combined text, chunked analysis, aggregation.
pub struct PostEnricher {
    analyzer: SentimentAnalyzer,
}

impl PostEnricher {
    pub fn new(analyzer: SentimentAnalyzer) -> Self {
        Self { analyzer }
    }

    pub fn analyzer(&self) -> &SentimentAnalyzer {
        &self.analyzer
    }

    /// Enrich a post found by `term`.
    ///
    /// Analysis failures are absorbed chunk by chunk, so this always yields a
    /// complete record.
    #[instrument(skip(self, post), fields(post_id = %post.id, forum = %post.forum))]
    pub async fn enrich(&self, post: &RawPost, term: &str) -> EnrichedPostRecord {
        let text = post.combined_text();
        let sentiment = self.analyzer.analyze_text(&text).await;

        info!(
            title = %post.title,
            overall_sentiment = %sentiment.overall_sentiment,
            sentiment_score = sentiment.sentiment_score,
            opinions = sentiment.opinions.len(),
            "Post enriched"
        );

        EnrichedPostRecord::new(post, text, term, sentiment)
    }
}
