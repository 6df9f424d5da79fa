//! Sentiment and opinion types produced by analysis.

use serde::{Deserialize, Serialize};

use crate::NEUTRAL_SCORE;

/// Document-level sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallSentiment {
    Positive,
    Negative,
    Neutral,
}

impl OverallSentiment {
    /// Classify a mean positive-confidence score.
    ///
    /// Only scores strictly above the midpoint are positive; 0.5 itself is
    /// negative.
    pub fn from_score(score: f64) -> Self {
        if score > NEUTRAL_SCORE {
            OverallSentiment::Positive
        } else {
            OverallSentiment::Negative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverallSentiment::Positive => "positive",
            OverallSentiment::Negative => "negative",
            OverallSentiment::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for OverallSentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A phrase-level assessment attached to an opinion target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub text: String,
    pub sentiment: String,
}

/// One mined opinion: a target phrase and the assessments made about it.
///
/// Labels are carried exactly as the backend reported them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpinionAssessment {
    pub target: String,
    pub target_sentiment: String,
    pub assessments: Vec<Assessment>,
}

/// Analysis output for a single chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSentimentResult {
    /// Positive confidence in `[0, 1]`
    pub positive_confidence: f64,

    /// Opinions mined from the chunk, in sentence order
    pub opinions: Vec<OpinionAssessment>,
}

/// Document-level sentiment combined from every analyzed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSentiment {
    pub overall_sentiment: OverallSentiment,
    pub sentiment_score: f64,
    pub opinions: Vec<OpinionAssessment>,
}

impl AggregatedSentiment {
    /// The result used when there is nothing to analyze.
    pub fn neutral() -> Self {
        Self {
            overall_sentiment: OverallSentiment::Neutral,
            sentiment_score: NEUTRAL_SCORE,
            opinions: Vec::new(),
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.overall_sentiment == OverallSentiment::Neutral
    }
}

impl Default for AggregatedSentiment {
    fn default() -> Self {
        Self::neutral()
    }
}
