//! Size-bounded batches of serialized records.

use serde::{Deserialize, Serialize};

use crate::DEFAULT_MAX_BATCH_BYTES;

/// Limits a sink imposes on one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLimits {
    /// Maximum total payload bytes
    pub max_bytes: usize,

    /// Maximum number of records, if the sink caps it
    pub max_records: Option<usize>,
}

impl BatchLimits {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            max_records: None,
        }
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_BYTES)
    }
}

/// Returned when a payload does not fit; hands the payload back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFull(pub String);

/// Serialized records awaiting a single send.
#[derive(Debug, Clone)]
pub struct EventBatch {
    limits: BatchLimits,
    payloads: Vec<String>,
    size_bytes: usize,
}

impl EventBatch {
    /// Create an empty batch.
    pub fn new(limits: BatchLimits) -> Self {
        Self {
            limits,
            payloads: Vec::new(),
            size_bytes: 0,
        }
    }

    /// Append a payload if it fits under both limits, counting its raw length.
    pub fn try_add(&mut self, payload: String) -> Result<(), BatchFull> {
        let encoded_len = payload.len();
        self.try_add_encoded(payload, encoded_len)
    }

    /// Append a payload that takes `encoded_len` bytes on the wire.
    pub fn try_add_encoded(&mut self, payload: String, encoded_len: usize) -> Result<(), BatchFull> {
        let at_record_cap = self
            .limits
            .max_records
            .is_some_and(|max| self.payloads.len() >= max);
        if at_record_cap || self.size_bytes.saturating_add(encoded_len) > self.limits.max_bytes {
            return Err(BatchFull(payload));
        }

        self.size_bytes += encoded_len;
        self.payloads.push(payload);
        Ok(())
    }

    /// Whether a payload of this encoded size could ever be sent.
    pub fn fits_empty(&self, encoded_len: usize) -> bool {
        encoded_len <= self.limits.max_bytes && self.limits.max_records != Some(0)
    }

    pub fn payloads(&self) -> &[String] {
        &self.payloads
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Encoded bytes counted against `max_bytes`.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn limits(&self) -> BatchLimits {
        self.limits
    }
}
