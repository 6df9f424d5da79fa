//! Combines per-chunk results into one document-level sentiment.

use crate::types::{AggregatedSentiment, ChunkSentimentResult, OverallSentiment};

/// Aggregate chunk outcomes in chunk order.
///
/// Failed chunks are left out entirely: the score is the mean over the
/// successful chunks only and their opinions are concatenated in order.
/// When no chunk succeeded the neutral result is returned.
pub fn aggregate<I, E>(outcomes: I) -> AggregatedSentiment
where
    I: IntoIterator<Item = Result<ChunkSentimentResult, E>>,
{
    let mut total = 0.0;
    let mut analyzed = 0usize;
    let mut opinions = Vec::new();

    for result in outcomes.into_iter().flatten() {
        total += result.positive_confidence;
        analyzed += 1;
        opinions.extend(result.opinions);
    }

    if analyzed == 0 {
        return AggregatedSentiment::neutral();
    }

    let sentiment_score = total / analyzed as f64;
    AggregatedSentiment {
        overall_sentiment: OverallSentiment::from_score(sentiment_score),
        sentiment_score,
        opinions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OpinionAssessment;
    use pretty_assertions::assert_eq;

    fn ok(score: f64, targets: &[&str]) -> Result<ChunkSentimentResult, String> {
        Ok(ChunkSentimentResult {
            positive_confidence: score,
            opinions: targets
                .iter()
                .map(|t| OpinionAssessment {
                    target: t.to_string(),
                    target_sentiment: "mixed".to_string(),
                    assessments: vec![],
                })
                .collect(),
        })
    }

    fn failed() -> Result<ChunkSentimentResult, String> {
        Err("quota exceeded".to_string())
    }

    #[test]
    fn test_mean_of_scores() {
        let result = aggregate(vec![ok(0.9, &[]), ok(0.6, &[]), ok(0.3, &[])]);
        assert!((result.sentiment_score - 0.6).abs() < 1e-9);
        assert_eq!(result.overall_sentiment, OverallSentiment::Positive);
    }

    #[test]
    fn test_single_chunk_unchanged() {
        let result = aggregate(vec![ok(0.73, &["game"])]);
        assert_eq!(result.sentiment_score, 0.73);
        assert_eq!(result.opinions.len(), 1);
    }

    #[test]
    fn test_midpoint_is_negative() {
        let result = aggregate(vec![ok(0.25, &[]), ok(0.75, &[])]);
        assert_eq!(result.sentiment_score, 0.5);
        assert_eq!(result.overall_sentiment, OverallSentiment::Negative);
    }

    #[test]
    fn test_failed_chunks_are_excluded() {
        let result = aggregate(vec![ok(0.8, &[]), failed(), ok(0.4, &[])]);
        assert!((result.sentiment_score - 0.6).abs() < 1e-9);
        assert_eq!(result.overall_sentiment, OverallSentiment::Positive);
    }

    #[test]
    fn test_all_failed_is_neutral() {
        let result = aggregate(vec![failed(), failed()]);
        assert_eq!(result, AggregatedSentiment::neutral());
    }

    #[test]
    fn test_no_chunks_is_neutral() {
        let result = aggregate(Vec::<Result<ChunkSentimentResult, String>>::new());
        assert!(result.is_neutral());
        assert_eq!(result.sentiment_score, 0.5);
    }

    #[test]
    fn test_opinions_keep_chunk_order() {
        let result = aggregate(vec![ok(0.5, &["a", "b"]), failed(), ok(0.5, &["c"])]);
        let targets: Vec<&str> = result.opinions.iter().map(|o| o.target.as_str()).collect();
        assert_eq!(targets, vec!["a", "b", "c"]);
    }
}
