pub mod activity;
pub mod enrichment;
pub mod reader;
pub mod schema;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page size used when a query does not set one.
pub const DEFAULT_LIMIT: usize = 1000;

/// One row of the events table, enriched at read time.
///
/// Nullable columns are read as empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub activity: i64,
    pub activity_name: String,
    pub activity_code: String,
    pub initiator_id: String,
    pub target_id: String,
    pub account_id: String,
    pub meta: String,
    pub initiator_email: String,
    pub target_email: String,
}

/// Column the events query is ordered by.
///
/// `Timestamp` is the historical order. Resumption bounds by id, so a row
/// whose timestamp sorts behind rows with larger ids can fall outside the
/// window; `Id` keeps order and bound on the same column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Timestamp,
    Id,
}

impl SortKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "timestamp" => Some(Self::Timestamp),
            "id" => Some(Self::Id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Page size; zero means [`DEFAULT_LIMIT`].
    pub limit: usize,
    pub offset: usize,
    pub account_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub activity: Option<i64>,
    /// Exclusive lower bound on the event id.
    pub min_event_id: Option<i64>,
    pub ascending: bool,
    pub sort_key: SortKey,
}

impl QueryOptions {
    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_LIMIT
        } else {
            self.limit
        }
    }
}
