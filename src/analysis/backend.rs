//! Seam for the external sentiment / opinion-mining capability.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Assessment, ChunkSentimentResult, OpinionAssessment};

/// Failure of one analysis call. Always recovered by skipping the chunk.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("sentiment request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("sentiment service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("sentiment service rejected the document ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("malformed sentiment response: {0}")]
    Malformed(String),

    #[error("sentiment call timed out after {0:?}")]
    Timeout(Duration),
}

/// The opinion target as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpinionTarget {
    pub text: String,
    pub sentiment: String,
}

/// A target with the assessments that refer to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinedOpinion {
    pub target: OpinionTarget,
    pub assessments: Vec<Assessment>,
}

/// Per-sentence output; only mined opinions are of interest here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentenceOpinions {
    pub mined_opinions: Vec<MinedOpinion>,
}

/// Backend result for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSentiment {
    pub positive_confidence: f64,
    pub sentences: Vec<SentenceOpinions>,
}

impl DocumentSentiment {
    /// Flatten into a chunk result, checking the score is a probability.
    pub fn into_chunk_result(self) -> Result<ChunkSentimentResult, AnalysisError> {
        let score = self.positive_confidence;
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(AnalysisError::Malformed(format!(
                "positive confidence {score} outside [0, 1]"
            )));
        }

        let opinions = self
            .sentences
            .into_iter()
            .flat_map(|sentence| sentence.mined_opinions)
            .map(|opinion| OpinionAssessment {
                target: opinion.target.text,
                target_sentiment: opinion.target.sentiment,
                assessments: opinion.assessments,
            })
            .collect();

        Ok(ChunkSentimentResult {
            positive_confidence: score,
            opinions,
        })
    }
}

/// An external sentiment analysis capability, called once per chunk.
#[async_trait]
pub trait SentimentBackend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &'static str;

    /// Analyze one piece of text.
    ///
    /// With `mine_opinions` unset the backend may skip opinion extraction and
    /// return no sentences.
    async fn analyze(
        &self,
        text: &str,
        mine_opinions: bool,
    ) -> Result<DocumentSentiment, AnalysisError>;
}
