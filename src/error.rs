//! Error taxonomy for the export pipeline.
//!
//! Reads, checkpoint writes and deliveries each have their own error type so
//! the processor can report which stage of a cycle failed. None of them is
//! fatal to the process: a failed cycle leaves the persisted checkpoint where
//! it was and the next scheduled cycle starts over from there.
//! [`ConfigError`] is the only startup-fatal error.

use std::path::PathBuf;
use thiserror::Error;

/// Reading from the events table failed.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to query events: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("event {id} has unparsable timestamp `{raw}`")]
    Timestamp { id: i64, raw: String },
}

/// Reading or writing a checkpoint row failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("checkpoint storage error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The monotonic guard refused to move a checkpoint backwards.
    #[error(
        "checkpoint for `{consumer_id}` is at event {stored}; refusing to move it back to {attempted}"
    )]
    Stale {
        consumer_id: String,
        stored: i64,
        attempted: i64,
    },

    #[error("checkpoint for `{consumer_id}` has unparsable {field} `{raw}`")]
    Corrupt {
        consumer_id: String,
        field: &'static str,
        raw: String,
    },
}

/// A sink could not accept a batch.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("sink write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink rejected batch: {0}")]
    Rejected(String),

    /// The batch was written except for the listed records, which the sink
    /// refused individually. The batch still counts as delivered.
    #[error("{} record(s) skipped during delivery: {event_ids:?}", event_ids.len())]
    RecordsSkipped { event_ids: Vec<i64> },
}

/// Invalid or missing configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// A processing cycle was aborted.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("failed to load checkpoint for `{consumer_id}`: {source}")]
    LoadCheckpoint {
        consumer_id: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to fetch events for `{consumer_id}` after event {after:?}: {source}")]
    Fetch {
        consumer_id: String,
        after: Option<i64>,
        #[source]
        source: QueryError,
    },

    #[error("failed to deliver events {first}..={last} for `{consumer_id}`: {source}")]
    Deliver {
        consumer_id: String,
        first: i64,
        last: i64,
        #[source]
        source: DeliveryError,
    },

    #[error("failed to save checkpoint at event {last_event_id} for `{consumer_id}`: {source}")]
    SaveCheckpoint {
        consumer_id: String,
        last_event_id: i64,
        #[source]
        source: StoreError,
    },

    #[error("processing cancelled")]
    Cancelled,
}
