//! # Event Stream Messaging
//!
//! Delivers enriched records to the downstream event stream.
//!
//! ## Features
//! - Size-bounded batches that are sent atomically
//! - Publisher that flushes on overflow and at end of run
//! - Retries with exponential backoff; lost records are counted, never hidden
//! - HTTP sink for the stream's REST ingestion endpoint, signed with a
//!   shared access signature minted from the connection string

pub mod batch;
pub mod connection;
pub mod http_sink;
pub mod publisher;
pub mod sink;

pub use batch::{BatchFull, BatchLimits, EventBatch};
pub use connection::{SasSigner, StreamConnection};
pub use http_sink::HttpStreamSink;
pub use publisher::{EventPublisher, PublishError, PublishStats, RetryPolicy};
pub use sink::{SinkError, StreamSink};
