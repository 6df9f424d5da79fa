//! Service configuration.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::TimeFilter;
use crate::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_BATCH_BYTES, DEFAULT_OPINION_POST_LIMIT,
    DEFAULT_SIMPLE_POST_LIMIT,
};

/// Environment variable naming an optional configuration file.
pub const CONFIG_FILE_ENV: &str = "INGEST_CONFIG";

/// Prefix for environment overrides (`INGEST_CHUNK_SIZE`, `INGEST_FORUMS`, ...).
pub const ENV_PREFIX: &str = "INGEST";

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("secret {0} is missing or empty")]
    MissingSecret(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to build {client} client: {message}")]
    Client { client: &'static str, message: String },
}

/// How much the sentiment backend is asked to extract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Document sentiment plus mined opinions
    #[default]
    OpinionMining,
    /// Document sentiment only; opinions are always empty
    Simple,
}

impl AnalysisMode {
    /// Per-forum result limit used when none is configured.
    pub fn default_post_limit(&self) -> usize {
        match self {
            AnalysisMode::OpinionMining => DEFAULT_OPINION_POST_LIMIT,
            AnalysisMode::Simple => DEFAULT_SIMPLE_POST_LIMIT,
        }
    }

    pub fn mines_opinions(&self) -> bool {
        matches!(self, AnalysisMode::OpinionMining)
    }
}

/// Global service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum characters per analysis chunk
    pub chunk_size: usize,

    /// Analysis mode
    pub mode: AnalysisMode,

    /// Per-forum result limit; falls back to the mode default
    pub post_limit: Option<usize>,

    /// Search recency window
    pub time_filter: TimeFilter,

    /// Forums searched by the scheduled run
    pub forums: Vec<String>,

    /// Terms searched by the scheduled run
    pub scheduled_terms: Vec<String>,

    /// Seconds between scheduled runs (0 disables the schedule)
    pub schedule_interval_secs: u64,

    /// Upper bound on one run's enumeration (0 means unbounded)
    pub run_timeout_secs: u64,

    /// Chunks analyzed concurrently for one post
    pub analysis_concurrency: usize,

    /// Per-batch payload limit of the stream sink
    pub max_batch_bytes: usize,

    /// Optional per-batch record limit
    pub max_batch_records: Option<usize>,

    /// Extra send attempts for a failed batch
    pub publish_retries: u32,

    /// Base delay for publish backoff
    pub retry_base_ms: u64,

    /// Timeout for every outbound HTTP request
    pub request_timeout_secs: u64,

    /// HTTP port for the trigger surface
    pub port: u16,

    /// User agent presented to the post source
    pub user_agent: String,

    /// OAuth token endpoint of the post source
    pub reddit_auth_url: String,

    /// API base URL of the post source
    pub reddit_api_url: String,

    /// Language hint for the sentiment backend
    pub analytics_language: String,

    /// Event hub receiving the records, unless the connection string names one
    pub event_hub_name: String,

    /// Lifetime of each shared access signature
    pub sas_token_ttl_secs: u64,

    /// Override for the stream ingestion URL (emulators, proxies)
    pub sink_url: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            mode: AnalysisMode::default(),
            post_limit: None,
            time_filter: TimeFilter::Day,
            forums: [
                "gaming",
                "xbox",
                "playstation",
                "games",
                "gamingnews",
                "gamingcirclejerk",
                "ps5",
                "xboxone",
                "gamernews",
                "xboxseriesx",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            scheduled_terms: vec!["Xbox".to_string(), "PlayStation".to_string()],
            schedule_interval_secs: 12 * 60 * 60,
            run_timeout_secs: 600,
            analysis_concurrency: 1,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            max_batch_records: None,
            publish_retries: 3,
            retry_base_ms: 500,
            request_timeout_secs: 30,
            port: 3017,
            user_agent: "production_app_agent".to_string(),
            reddit_auth_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            reddit_api_url: "https://oauth.reddit.com".to_string(),
            analytics_language: "en".to_string(),
            event_hub_name: "reddit-data-stream".to_string(),
            sas_token_ttl_secs: 3600,
            sink_url: None,
        }
    }
}

impl IngestConfig {
    /// Load configuration from defaults, the file named by `INGEST_CONFIG`
    /// and `INGEST_*` environment variables, in that order of precedence.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var(CONFIG_FILE_ENV).ok();
        Self::load_from(file.as_deref().map(Path::new), ENV_PREFIX)
    }

    /// Load configuration from an optional file and an environment prefix.
    pub fn load_from(file: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("forums")
                .with_list_parse_key("scheduled_terms"),
        );

        let config: IngestConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1".to_string()));
        }
        if self.analysis_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "analysis_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_batch_bytes == 0 {
            return Err(ConfigError::Invalid("max_batch_bytes must be at least 1".to_string()));
        }
        if self.max_batch_records == Some(0) {
            return Err(ConfigError::Invalid(
                "max_batch_records must be at least 1 when set".to_string(),
            ));
        }
        if self.sas_token_ttl_secs == 0 {
            return Err(ConfigError::Invalid("sas_token_ttl_secs must be at least 1".to_string()));
        }
        if self.post_limit == Some(0) {
            return Err(ConfigError::Invalid("post_limit must be at least 1 when set".to_string()));
        }
        Ok(())
    }

    /// Per-forum result limit in effect for the configured mode.
    pub fn effective_post_limit(&self) -> usize {
        self.post_limit.unwrap_or_else(|| self.mode.default_post_limit())
    }

    pub fn schedule_interval(&self) -> Option<Duration> {
        (self.schedule_interval_secs > 0).then(|| Duration::from_secs(self.schedule_interval_secs))
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }

    pub fn sas_token_ttl(&self) -> Duration {
        Duration::from_secs(self.sas_token_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
