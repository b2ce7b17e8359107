pub mod store;

use crate::error::StoreError;
use crate::events::EventRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use store::SqliteCheckpointStore;

/// Last confirmed position of one consumer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    pub consumer_id: String,
    pub last_event_id: i64,
    pub last_event_timestamp: Option<DateTime<Utc>>,
    pub total_events_processed: i64,
    /// Node that last wrote the row. Informational only.
    pub processing_node: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// In-memory starting point for a consumer that has never committed.
    pub fn initial(consumer_id: &str, node: &str) -> Self {
        Self {
            consumer_id: consumer_id.to_string(),
            last_event_id: 0,
            last_event_timestamp: None,
            total_events_processed: 0,
            processing_node: node.to_string(),
            updated_at: None,
            created_at: None,
        }
    }

    /// Moves the checkpoint to the last record of a delivered batch.
    pub fn advance(&mut self, last: &EventRecord, delivered: usize, node: &str) {
        self.last_event_id = last.id;
        self.last_event_timestamp = Some(last.timestamp);
        self.total_events_processed += delivered as i64;
        self.processing_node = node.to_string();
    }
}

/// How a save treats an existing row for the same consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointGuard {
    /// Unconditional upsert; the last writer wins. Assumes a single writer
    /// per consumer identity.
    #[default]
    Overwrite,
    /// Refuse to lower `last_event_id`.
    Monotonic,
}

impl CheckpointGuard {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Some(Self::Overwrite),
            "monotonic" => Some(Self::Monotonic),
            _ => None,
        }
    }
}

pub trait CheckpointStore {
    /// `Ok(None)` for a consumer that has never committed.
    fn load(&self, consumer_id: &str) -> Result<Option<Checkpoint>, StoreError>;

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;
}
