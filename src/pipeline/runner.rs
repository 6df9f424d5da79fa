//! Run orchestration: search every forum for every term, enrich and publish.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::enricher::PostEnricher;
use super::report::{FailedSearch, IngestError, RunReport, RunRequest, StopReason};
use crate::messaging::{EventPublisher, RetryPolicy, StreamSink};
use crate::source::{PostSource, TimeFilter};
use crate::types::IngestConfig;

/// Per-run settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Maximum posts per forum/term search
    pub post_limit: usize,
    pub time_filter: TimeFilter,
    /// Stop enumerating after this long; the open batch is still flushed
    pub run_timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl RunSettings {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            post_limit: config.effective_post_limit(),
            time_filter: config.time_filter,
            run_timeout: config.run_timeout(),
            retry: RetryPolicy::new(
                config.publish_retries,
                Duration::from_millis(config.retry_base_ms),
            ),
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

/// The fetch, enrich and publish pipeline.
///
/// Each run owns its publisher, so concurrent runs never share a batch.
pub struct IngestPipeline {
    source: Arc<dyn PostSource>,
    enricher: PostEnricher,
    sink: Arc<dyn StreamSink>,
    settings: RunSettings,
}

impl IngestPipeline {
    /// Create a new pipeline.
    pub fn new(
        source: Arc<dyn PostSource>,
        enricher: PostEnricher,
        sink: Arc<dyn StreamSink>,
        settings: RunSettings,
    ) -> Self {
        Self {
            source,
            enricher,
            sink,
            settings,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run to completion (or until the run timeout).
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport, IngestError> {
        let (_never_cancelled, cancel) = watch::channel(false);
        self.run_until(request, cancel).await
    }

    /// Run until done, timed out, or `cancel` turns true.
    ///
    /// Stopping ends enumeration of further posts and searches. Records
    /// already in the open batch are flushed either way.
    pub async fn run_until(
        &self,
        request: &RunRequest,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<RunReport, IngestError> {
        let mut report = RunReport::start(request);
        let deadline = self.settings.run_timeout.map(|limit| Instant::now() + limit);
        let mut publisher = EventPublisher::new(Arc::clone(&self.sink), self.settings.retry);

        info!(
            run_id = %report.run_id,
            forums = request.forums.len(),
            terms = request.terms.len(),
            source = self.source.name(),
            sink = self.sink.name(),
            "Starting ingestion run"
        );

        'searches: for (term, forum) in request.searches() {
            if let Some(reason) = stop_requested(&cancel, deadline) {
                report.stopped = Some(reason);
                break;
            }

            report.searches += 1;
            info!(forum, term, "Searching forum");

            let search = self.source.search(
                forum,
                term,
                self.settings.time_filter,
                self.settings.post_limit,
            );
            let posts = match interruptible(deadline, &mut cancel, search).await {
                Ok(Ok(posts)) => posts,
                Ok(Err(e)) => {
                    warn!(forum, term, error = %e, "Search failed, skipping forum/term pair");
                    report.failed_searches.push(FailedSearch {
                        forum: forum.to_string(),
                        term: term.to_string(),
                        error: e.to_string(),
                    });
                    continue;
                }
                Err(reason) => {
                    report.stopped = Some(reason);
                    break;
                }
            };

            report.posts_fetched += posts.len();

            for post in &posts {
                if let Some(reason) = stop_requested(&cancel, deadline) {
                    report.stopped = Some(reason);
                    break 'searches;
                }

                let record =
                    match interruptible(deadline, &mut cancel, self.enricher.enrich(post, term)).await
                    {
                        Ok(record) => record,
                        Err(reason) => {
                            report.stopped = Some(reason);
                            break 'searches;
                        }
                    };
                report.records_enriched += 1;

                // Publishing is never interrupted so the open batch stays whole.
                if let Err(e) = publisher.publish(&record).await {
                    if e.is_delivery() {
                        report.publish_error = Some(e.to_string());
                        report.stopped = Some(StopReason::PublishFailed);
                        break 'searches;
                    }
                }
            }
        }

        if let Some(reason) = report.stopped {
            warn!(run_id = %report.run_id, ?reason, pending = publisher.pending(), "Run stopped early, flushing open batch");
        }

        if let Err(e) = publisher.flush().await {
            report.publish_error.get_or_insert_with(|| e.to_string());
        }
        report.finish(publisher.stats());

        info!(
            run_id = %report.run_id,
            searches = report.searches,
            failed_searches = report.failed_searches.len(),
            posts_fetched = report.posts_fetched,
            records_enriched = report.records_enriched,
            records_published = report.records_published,
            records_lost = report.records_lost,
            "Ingestion run finished"
        );

        if report.is_success() {
            return Ok(report);
        }

        let message = report
            .publish_error
            .clone()
            .unwrap_or_else(|| "records could not be published".to_string());
        error!(run_id = %report.run_id, lost = report.records_lost, %message, "Ingestion run failed");
        Err(IngestError::Publish {
            lost: report.records_lost,
            message,
            report: Box::new(report),
        })
    }
}

fn stop_requested(cancel: &watch::Receiver<bool>, deadline: Option<Instant>) -> Option<StopReason> {
    if *cancel.borrow() {
        return Some(StopReason::Cancelled);
    }
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Some(StopReason::TimedOut),
        _ => None,
    }
}

/// Drive `fut` unless the deadline passes or cancellation is signalled first.
async fn interruptible<F: Future>(
    deadline: Option<Instant>,
    cancel: &mut watch::Receiver<bool>,
    fut: F,
) -> Result<F::Output, StopReason> {
    let bounded = async {
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| StopReason::TimedOut),
            None => Ok(fut.await),
        }
    };

    tokio::select! {
        out = bounded => out,
        _ = cancelled(cancel) => Err(StopReason::Cancelled),
    }
}

/// Resolve once cancellation is signalled; never if the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
