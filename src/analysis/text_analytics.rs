//! HTTP client for the Azure Text Analytics sentiment endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backend::{
    AnalysisError, DocumentSentiment, MinedOpinion, OpinionTarget, SentenceOpinions,
    SentimentBackend,
};
use crate::types::{Assessment, ConfigError};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const SENTIMENT_PATH: &str = "text/analytics/v3.1/sentiment";

/// Sentiment backend backed by the Text Analytics REST API.
pub struct TextAnalyticsClient {
    client: Client,
    endpoint: String,
    language: String,
}

/// Request payload for the sentiment endpoint.
#[derive(Debug, Serialize)]
struct SentimentRequest<'a> {
    documents: [RequestDocument<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestDocument<'a> {
    id: &'static str,
    language: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    #[serde(default)]
    documents: Vec<DocumentResult>,
    #[serde(default)]
    errors: Vec<DocumentError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentResult {
    confidence_scores: ConfidenceScores,
    #[serde(default)]
    sentences: Vec<SentenceResult>,
}

#[derive(Debug, Deserialize)]
struct ConfidenceScores {
    positive: f64,
}

#[derive(Debug, Deserialize)]
struct SentenceResult {
    #[serde(default)]
    targets: Vec<TargetResult>,
    #[serde(default)]
    assessments: Vec<AssessmentResult>,
}

#[derive(Debug, Deserialize)]
struct TargetResult {
    text: String,
    sentiment: String,
    #[serde(default)]
    relations: Vec<Relation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Relation {
    relation_type: String,
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Debug, Deserialize)]
struct AssessmentResult {
    text: String,
    sentiment: String,
}

#[derive(Debug, Deserialize)]
struct DocumentError {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl TextAnalyticsClient {
    /// Create a new client for the given endpoint and subscription key.
    pub fn new(endpoint: &str, key: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            SUBSCRIPTION_KEY_HEADER,
            HeaderValue::from_str(key.trim()).map_err(|e| ConfigError::Client {
                client: "text analytics",
                message: format!("invalid subscription key: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Client {
                client: "text analytics",
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            language: "en".to_string(),
        })
    }

    /// Set the language hint sent with every document.
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }
}

#[async_trait]
impl SentimentBackend for TextAnalyticsClient {
    fn name(&self) -> &'static str {
        "text_analytics"
    }

    async fn analyze(
        &self,
        text: &str,
        mine_opinions: bool,
    ) -> Result<DocumentSentiment, AnalysisError> {
        let url = format!("{}/{}", self.endpoint, SENTIMENT_PATH);
        let request = SentimentRequest {
            documents: [RequestDocument {
                id: "0",
                language: &self.language,
                text,
            }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[
                ("opinionMining", if mine_opinions { "true" } else { "false" }),
                ("stringIndexType", "UnicodeCodePoint"),
            ])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: SentimentResponse = response.json().await?;
        debug!(chars = text.chars().count(), "Sentiment response received");
        parse_response(body)
    }
}

/// Turn the wire response into the backend-neutral document result.
fn parse_response(body: SentimentResponse) -> Result<DocumentSentiment, AnalysisError> {
    if let Some(failure) = body.errors.into_iter().next() {
        return Err(AnalysisError::Rejected {
            code: failure.error.code,
            message: failure.error.message,
        });
    }

    let document = body
        .documents
        .into_iter()
        .next()
        .ok_or_else(|| AnalysisError::Malformed("response contained no documents".to_string()))?;

    let sentences = document.sentences;
    let mut resolved = Vec::with_capacity(sentences.len());
    for sentence in &sentences {
        let mut mined_opinions = Vec::with_capacity(sentence.targets.len());
        for target in &sentence.targets {
            let mut assessments = Vec::new();
            for relation in target
                .relations
                .iter()
                .filter(|r| r.relation_type == "assessment")
            {
                let (s, a) = parse_assessment_ref(&relation.reference).ok_or_else(|| {
                    AnalysisError::Malformed(format!("bad assessment ref {}", relation.reference))
                })?;
                let found = sentences
                    .get(s)
                    .and_then(|sentence| sentence.assessments.get(a))
                    .ok_or_else(|| {
                        AnalysisError::Malformed(format!(
                            "assessment ref {} points nowhere",
                            relation.reference
                        ))
                    })?;
                assessments.push(Assessment {
                    text: found.text.clone(),
                    sentiment: found.sentiment.clone(),
                });
            }
            mined_opinions.push(MinedOpinion {
                target: OpinionTarget {
                    text: target.text.clone(),
                    sentiment: target.sentiment.clone(),
                },
                assessments,
            });
        }
        resolved.push(SentenceOpinions { mined_opinions });
    }

    Ok(DocumentSentiment {
        positive_confidence: document.confidence_scores.positive,
        sentences: resolved,
    })
}

/// Parse `#/documents/0/sentences/{s}/assessments/{a}` into `(s, a)`.
fn parse_assessment_ref(reference: &str) -> Option<(usize, usize)> {
    let mut parts = reference.rsplit('/');
    let assessment = parts.next()?.parse().ok()?;
    if parts.next()? != "assessments" {
        return None;
    }
    let sentence = parts.next()?.parse().ok()?;
    if parts.next()? != "sentences" {
        return None;
    }
    Some((sentence, assessment))
}
