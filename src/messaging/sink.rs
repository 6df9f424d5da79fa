//! Seam for the event-stream transport.

use async_trait::async_trait;
use thiserror::Error;

use super::batch::{BatchLimits, EventBatch};

/// Failure of a single batch send.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("stream sink request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("stream sink rejected batch with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("stream sink unavailable: {0}")]
    Unavailable(String),
}

/// A durable event stream that accepts batches atomically.
#[async_trait]
pub trait StreamSink: Send + Sync {
    /// Get the name of this sink.
    fn name(&self) -> &'static str;

    /// Per-batch limits of this sink.
    fn limits(&self) -> BatchLimits;

    /// Bytes a payload adds to a batch once encoded for the wire.
    fn encoded_len(&self, payload: &str) -> usize {
        payload.len()
    }

    /// Start a new, empty batch sized for this sink.
    fn create_batch(&self) -> EventBatch {
        EventBatch::new(self.limits())
    }

    /// Send a whole batch; either every record is accepted or none is.
    async fn send(&self, batch: &EventBatch) -> Result<(), SinkError>;
}
