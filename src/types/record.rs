//! The publish-ready enriched record.

use serde::{Deserialize, Serialize};

use super::{AggregatedSentiment, OpinionAssessment, OverallSentiment, RawPost};

/// A post merged with its sentiment analysis and the search term that found it.
///
/// Field order is the serialized order; consumers and tests rely on it.
/// `post_id` is unique within a run only. The same post may be emitted again
/// by a later run or by another matching term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPostRecord {
    pub title: String,
    pub score: i64,
    pub comments: i64,
    pub post_id: String,
    pub text: String,
    pub author: String,
    pub subreddit: String,
    pub subreddit_id: String,
    pub created_utc: f64,
    pub arg: String,
    pub overall_sentiment: OverallSentiment,
    pub sentiment_score: f64,
    pub opinions: Vec<OpinionAssessment>,
}

impl EnrichedPostRecord {
    /// Build a record from a post, its combined text, the matching term and
    /// the aggregated sentiment.
    pub fn new(post: &RawPost, text: String, term: &str, sentiment: AggregatedSentiment) -> Self {
        Self {
            title: post.title.clone(),
            score: post.score,
            comments: post.num_comments,
            post_id: post.id.clone(),
            text,
            author: post.author.clone(),
            subreddit: post.forum.clone(),
            subreddit_id: post.forum_id.clone(),
            created_utc: post.created_utc,
            arg: term.to_string(),
            overall_sentiment: sentiment.overall_sentiment,
            sentiment_score: sentiment.sentiment_score,
            opinions: sentiment.opinions,
        }
    }

    /// Serialize to the JSON payload sent to the stream.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Assessment;

    #[test]
    fn test_payload_field_order() {
        let post = RawPost {
            id: "p1".to_string(),
            title: "New console".to_string(),
            score: 42,
            num_comments: 2,
            author: "gamer".to_string(),
            forum: "xbox".to_string(),
            forum_id: "t5_xbox".to_string(),
            created_utc: 1_700_000_000.5,
            selftext: "great game".to_string(),
            comments: vec!["loved it".to_string()],
        };
        let sentiment = AggregatedSentiment {
            overall_sentiment: OverallSentiment::Positive,
            sentiment_score: 0.9,
            opinions: vec![OpinionAssessment {
                target: "game".to_string(),
                target_sentiment: "positive".to_string(),
                assessments: vec![Assessment {
                    text: "great".to_string(),
                    sentiment: "positive".to_string(),
                }],
            }],
        };

        let record = EnrichedPostRecord::new(&post, post.combined_text(), "Xbox", sentiment);
        let payload = record.to_payload().unwrap();

        assert_eq!(
            payload,
            concat!(
                r#"{"title":"New console","score":42,"comments":2,"post_id":"p1","#,
                r#""text":"great game loved it","author":"gamer","subreddit":"xbox","#,
                r#""subreddit_id":"t5_xbox","created_utc":1700000000.5,"arg":"Xbox","#,
                r#""overall_sentiment":"positive","sentiment_score":0.9,"#,
                r#""opinions":[{"target":"game","target_sentiment":"positive","#,
                r#""assessments":[{"text":"great","sentiment":"positive"}]}]}"#
            )
        );
    }
}
