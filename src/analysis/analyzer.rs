//! Adapter that runs chunked text through a sentiment backend.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::aggregator::aggregate;
use super::backend::{AnalysisError, SentimentBackend};
use crate::chunkers::{TextChunk, TextChunker};
use crate::types::{AggregatedSentiment, AnalysisMode, ChunkSentimentResult};

/// Chunks text, analyzes every chunk independently and aggregates the results.
///
/// A failing chunk is logged and left out of the aggregate; it never fails the
/// whole analysis.
pub struct SentimentAnalyzer {
    backend: Arc<dyn SentimentBackend>,
    chunker: TextChunker,
    mode: AnalysisMode,
    concurrency: usize,
    call_timeout: Option<Duration>,
}

impl SentimentAnalyzer {
    /// Create an analyzer in opinion-mining mode that analyzes one chunk at a time.
    pub fn new(backend: Arc<dyn SentimentBackend>, chunker: TextChunker) -> Self {
        Self {
            backend,
            chunker,
            mode: AnalysisMode::OpinionMining,
            concurrency: 1,
            call_timeout: None,
        }
    }

    /// Set the analysis mode.
    pub fn with_mode(mut self, mode: AnalysisMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set how many chunks of one text may be in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Bound each backend call.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    /// Analyze a single chunk.
    pub async fn analyze_chunk(
        &self,
        chunk: &TextChunk<'_>,
    ) -> Result<ChunkSentimentResult, AnalysisError> {
        let call = self.backend.analyze(chunk.content, self.mode.mines_opinions());
        let document = match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| AnalysisError::Timeout(limit))??,
            None => call.await?,
        };

        let mut result = document.into_chunk_result()?;
        if !self.mode.mines_opinions() {
            result.opinions.clear();
        }
        Ok(result)
    }

    /// Analyze a whole text.
    ///
    /// Empty text returns the neutral result without calling the backend.
    pub async fn analyze_text(&self, text: &str) -> AggregatedSentiment {
        if text.is_empty() {
            debug!("Text is empty, skipping sentiment analysis");
            return AggregatedSentiment::neutral();
        }

        let backend = self.backend.name();
        let analyses: Vec<_> = self
            .chunker
            .chunks(text)
            .map(|chunk| async move {
                let outcome = self.analyze_chunk(&chunk).await;
                if let Err(e) = &outcome {
                    warn!(
                        backend,
                        chunk_index = chunk.index,
                        chunk_len = chunk.len,
                        error = %e,
                        "Sentiment analysis failed for chunk, skipping it"
                    );
                }
                outcome
            })
            .collect();
        let outcomes: Vec<Result<ChunkSentimentResult, AnalysisError>> = stream::iter(analyses)
            .buffered(self.concurrency)
            .collect()
            .await;

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        if failed > 0 && failed == outcomes.len() {
            warn!(
                backend,
                chunks = outcomes.len(),
                "Every chunk failed analysis, falling back to neutral"
            );
        }

        aggregate(outcomes)
    }
}
