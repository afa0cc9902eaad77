//! Per-stream cursors that make projections idempotent.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use trattoria_core::AggregateId;
use trattoria_events::EventEnvelope;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize { aggregate_type: String, message: String },

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Last applied sequence number per stream.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, aggregate_id: AggregateId) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|c| c.get(&aggregate_id).copied())
            .unwrap_or(0)
    }

    pub fn advance(&self, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut c) = self.inner.write() {
            c.insert(aggregate_id, sequence_number);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut c) = self.inner.write() {
            c.clear();
        }
    }

    /// Decode `envelope` into `E` if it belongs to `aggregate_type` and has
    /// not been applied yet.
    ///
    /// Returns `Ok(None)` for other aggregate types and for duplicates. A gap
    /// in the stream (`seq > last + 1` on a stream already seen) is an error.
    pub fn decode<E: DeserializeOwned>(
        &self,
        aggregate_type: &str,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<Option<E>, ProjectionError> {
        if envelope.aggregate_type() != aggregate_type {
            return Ok(None);
        }

        let seq = envelope.sequence_number();
        let last = self.get(envelope.aggregate_id());
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(None);
        }
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        serde_json::from_value(envelope.payload().clone())
            .map(Some)
            .map_err(|e| ProjectionError::Deserialize {
                aggregate_type: aggregate_type.to_string(),
                message: e.to_string(),
            })
    }
}
