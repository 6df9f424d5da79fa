//! Batching publisher with at-least-once delivery to a stream sink.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use super::batch::{BatchFull, EventBatch};
use super::sink::{SinkError, StreamSink};
use crate::types::EnrichedPostRecord;

/// Why a record did not reach the stream.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize record {post_id}: {source}")]
    Serialize {
        post_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {post_id} is {size} bytes, over the {limit}-byte batch limit")]
    Oversized {
        post_id: String,
        size: usize,
        limit: usize,
    },

    #[error("batch of {records} records lost after {attempts} attempts: {source}")]
    Delivery {
        records: usize,
        attempts: u32,
        #[source]
        source: SinkError,
    },
}

impl PublishError {
    /// Whether the sink itself is failing, as opposed to one bad record.
    pub fn is_delivery(&self) -> bool {
        matches!(self, PublishError::Delivery { .. })
    }
}

/// Exponential backoff between send attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (1-based): base, 2x base, 4x base, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2_u32.pow(exponent))
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Delivery counters for reconciling fetched against published records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishStats {
    /// Records handed to `publish`
    pub accepted: usize,
    /// Records in batches the sink acknowledged
    pub published: usize,
    /// Records that will not be delivered
    pub lost: usize,
    pub batches_sent: usize,
    pub batches_failed: usize,
}

/// Appends records to the open batch and sends it when it fills up.
///
/// A record that does not fit is held back and starts the next batch, so
/// every accepted record gets at least one delivery attempt. Call
/// [`EventPublisher::flush`] at the end of a run to send the remainder.
pub struct EventPublisher {
    sink: Arc<dyn StreamSink>,
    retry: RetryPolicy,
    batch: EventBatch,
    stats: PublishStats,
}

impl EventPublisher {
    /// Create a publisher with an empty batch.
    pub fn new(sink: Arc<dyn StreamSink>, retry: RetryPolicy) -> Self {
        let batch = sink.create_batch();
        Self {
            sink,
            retry,
            batch,
            stats: PublishStats::default(),
        }
    }

    /// Serialize and append a record, sending the open batch first if the
    /// record would overflow it.
    pub async fn publish(&mut self, record: &EnrichedPostRecord) -> Result<(), PublishError> {
        self.stats.accepted += 1;

        let payload = match record.to_payload() {
            Ok(payload) => payload,
            Err(source) => {
                self.stats.lost += 1;
                error!(post_id = %record.post_id, error = %source, "Record could not be serialized, dropping it");
                return Err(PublishError::Serialize {
                    post_id: record.post_id.clone(),
                    source,
                });
            }
        };

        let encoded_len = self.sink.encoded_len(&payload);
        if !self.batch.fits_empty(encoded_len) {
            self.stats.lost += 1;
            let limit = self.batch.limits().max_bytes;
            error!(
                post_id = %record.post_id,
                size = encoded_len,
                limit,
                "Record exceeds the batch size limit, dropping it"
            );
            return Err(PublishError::Oversized {
                post_id: record.post_id.clone(),
                size: encoded_len,
                limit,
            });
        }

        match self.batch.try_add_encoded(payload, encoded_len) {
            Ok(()) => Ok(()),
            Err(BatchFull(payload)) => {
                let sent = self.send_open_batch().await;
                if let Err(BatchFull(_)) = self.batch.try_add_encoded(payload, encoded_len) {
                    self.stats.lost += 1;
                    error!(post_id = %record.post_id, "Record does not fit an empty batch, dropping it");
                }
                sent
            }
        }
    }

    /// Send whatever is in the open batch.
    pub async fn flush(&mut self) -> Result<(), PublishError> {
        self.send_open_batch().await
    }

    /// Records waiting in the open batch.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    async fn send_open_batch(&mut self) -> Result<(), PublishError> {
        let batch = std::mem::replace(&mut self.batch, self.sink.create_batch());
        if batch.is_empty() {
            return Ok(());
        }
        self.send_with_retry(&batch).await
    }

    #[instrument(skip(self, batch), fields(sink = self.sink.name(), records = batch.len()))]
    async fn send_with_retry(&mut self, batch: &EventBatch) -> Result<(), PublishError> {
        let mut attempt = 0u32;
        loop {
            match self.sink.send(batch).await {
                Ok(()) => {
                    self.stats.published += batch.len();
                    self.stats.batches_sent += 1;
                    info!(
                        records = batch.len(),
                        batch_bytes = batch.size_bytes(),
                        attempts = attempt + 1,
                        "Batch delivered to stream"
                    );
                    return Ok(());
                }
                Err(e) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.backoff(attempt);
                    warn!(error = %e, attempt, ?delay, "Batch send failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    self.stats.lost += batch.len();
                    self.stats.batches_failed += 1;
                    error!(
                        records = batch.len(),
                        attempts = attempt + 1,
                        error = %e,
                        "Batch send failed permanently, records lost"
                    );
                    return Err(PublishError::Delivery {
                        records: batch.len(),
                        attempts: attempt + 1,
                        source: e,
                    });
                }
            }
        }
    }
}
