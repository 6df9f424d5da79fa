//! Scheduled trigger: runs a fixed forum/term set on an interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::pipeline::{IngestPipeline, RunRequest};
use crate::types::IngestConfig;

/// A tick this late is reported as past due.
const PAST_DUE_THRESHOLD: Duration = Duration::from_secs(1);

/// Periodic ingestion of the configured forums and terms.
pub struct Schedule {
    pipeline: Arc<IngestPipeline>,
    request: RunRequest,
    every: Duration,
}

impl Schedule {
    pub fn new(pipeline: Arc<IngestPipeline>, request: RunRequest, every: Duration) -> Self {
        Self {
            pipeline,
            request,
            every,
        }
    }

    /// Build the schedule from configuration, or `None` when it is disabled.
    pub fn from_config(pipeline: Arc<IngestPipeline>, config: &IngestConfig) -> Option<Self> {
        let every = config.schedule_interval()?;
        let request = RunRequest::new(config.forums.clone(), config.scheduled_terms.clone());
        Some(Self::new(pipeline, request, every))
    }

    /// Run until `shutdown` turns true. Failures are logged and the next tick
    /// runs as usual.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            every_secs = self.every.as_secs(),
            forums = self.request.forums.len(),
            terms = ?self.request.terms,
            "Scheduled ingestion enabled"
        );

        loop {
            tokio::select! {
                scheduled = interval.tick() => {
                    let lateness = scheduled.elapsed();
                    if lateness > PAST_DUE_THRESHOLD {
                        warn!(late_secs = lateness.as_secs(), "The timer is past due");
                    }
                    info!(at = %chrono::Utc::now().to_rfc3339(), "Timer trigger fired");
                    self.run_once(shutdown.clone()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Scheduled ingestion stopped");
                        return;
                    }
                }
            }
        }
    }

    async fn run_once(&self, shutdown: watch::Receiver<bool>) {
        match self.pipeline.run_until(&self.request, shutdown).await {
            Ok(report) => {
                for term in &report.terms {
                    info!(term = %term, "Data fetching completed");
                }
                if !report.failed_searches.is_empty() {
                    warn!(
                        run_id = %report.run_id,
                        failed = report.failed_searches.len(),
                        "Scheduled run skipped failing searches"
                    );
                }
            }
            Err(e) => error!(error = %e, "Scheduled run failed"),
        }
    }
}
