//! Outcome of one ingestion run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::messaging::PublishStats;
use crate::types::ConfigError;

/// Forums and terms for one run. Every term is searched in every forum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub forums: Vec<String>,
    pub terms: Vec<String>,
}

impl RunRequest {
    pub fn new(forums: Vec<String>, terms: Vec<String>) -> Self {
        Self { forums, terms }
    }

    /// `(term, forum)` pairs, term-major.
    pub fn searches(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.terms.iter().flat_map(move |term| {
            self.forums
                .iter()
                .map(move |forum| (term.as_str(), forum.as_str()))
        })
    }

    pub fn search_count(&self) -> usize {
        self.forums.len() * self.terms.len()
    }
}

/// Why enumeration ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Cancelled,
    TimedOut,
    PublishFailed,
}

/// A forum/term pair whose search failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedSearch {
    pub forum: String,
    pub term: String,
    pub error: String,
}

/// Counters and failures of a run, returned to the trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub forums: Vec<String>,
    pub terms: Vec<String>,
    pub searches: usize,
    pub posts_fetched: usize,
    pub records_enriched: usize,
    pub records_published: usize,
    pub records_lost: usize,
    pub failed_searches: Vec<FailedSearch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped: Option<StopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_error: Option<String>,
}

impl RunReport {
    pub fn start(request: &RunRequest) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            forums: request.forums.clone(),
            terms: request.terms.clone(),
            searches: 0,
            posts_fetched: 0,
            records_enriched: 0,
            records_published: 0,
            records_lost: 0,
            failed_searches: Vec::new(),
            stopped: None,
            publish_error: None,
        }
    }

    /// Record final delivery counts and the finish time.
    pub fn finish(&mut self, stats: PublishStats) {
        self.records_published = stats.published;
        self.records_lost = stats.lost;
        self.finished_at = Some(Utc::now());
    }

    /// No record was lost on the way to the stream.
    pub fn is_success(&self) -> bool {
        self.records_lost == 0 && self.publish_error.is_none()
    }

    /// Every search ran and every record was delivered.
    pub fn is_complete(&self) -> bool {
        self.is_success() && self.failed_searches.is_empty() && self.stopped.is_none()
    }
}

/// Errors that end a run with a failed status.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("run lost {lost} records: {message}")]
    Publish {
        lost: usize,
        message: String,
        report: Box<RunReport>,
    },
}

impl IngestError {
    /// The run report, when the run got far enough to produce one.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            IngestError::Publish { report, .. } => Some(report.as_ref()),
            IngestError::Configuration(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_searches_cross_product() {
        let request = RunRequest::new(
            vec!["gaming".to_string(), "xbox".to_string()],
            vec!["Xbox".to_string(), "PlayStation".to_string()],
        );
        let pairs: Vec<(&str, &str)> = request.searches().collect();
        assert_eq!(
            pairs,
            vec![
                ("Xbox", "gaming"),
                ("Xbox", "xbox"),
                ("PlayStation", "gaming"),
                ("PlayStation", "xbox"),
            ]
        );
        assert_eq!(request.search_count(), 4);
    }

    #[test]
    fn test_report_success_flags() {
        let request = RunRequest::new(vec!["a".to_string()], vec!["t".to_string()]);
        let mut report = RunReport::start(&request);
        report.finish(PublishStats {
            accepted: 2,
            published: 2,
            ..Default::default()
        });
        assert!(report.is_success());
        assert!(report.is_complete());

        report.failed_searches.push(FailedSearch {
            forum: "a".to_string(),
            term: "t".to_string(),
            error: "503".to_string(),
        });
        assert!(report.is_success());
        assert!(!report.is_complete());

        report.records_lost = 1;
        assert!(!report.is_success());
    }
}
