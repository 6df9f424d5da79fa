//! Post sources: where matching forum posts come from.

mod reddit;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RawPost;

pub use reddit::{RedditClient, RedditCredentials};

/// Failure to search one forum for one term. Recovered by skipping the pair.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("post source request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("post source returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("post source authentication failed: {0}")]
    Auth(String),

    #[error("malformed post source response: {0}")]
    Malformed(String),

    #[error("post source call timed out")]
    Timeout,
}

/// Recency window applied to a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    Hour,
    #[default]
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFilter::Hour => "hour",
            TimeFilter::Day => "day",
            TimeFilter::Week => "week",
            TimeFilter::Month => "month",
            TimeFilter::Year => "year",
            TimeFilter::All => "all",
        }
    }
}

impl std::fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enumerates posts in a forum that match a search term.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Get the name of this source.
    fn name(&self) -> &'static str;

    /// Search `forum` for `term`, returning at most `limit` posts with their
    /// comment threads loaded.
    async fn search(
        &self,
        forum: &str,
        term: &str,
        time_filter: TimeFilter,
        limit: usize,
    ) -> Result<Vec<RawPost>, SourceError>;
}
