use crate::checkpoint::{Checkpoint, CheckpointGuard, CheckpointStore};
use crate::error::StoreError;
use crate::events::schema;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

const SELECT_COLUMNS: &str = "SELECT consumer_id, last_event_id, last_event_timestamp, total_events_processed,
            COALESCE(processing_node, ''), updated_at, created_at
     FROM event_processing_checkpoint";

const UPSERT: &str = "INSERT INTO event_processing_checkpoint
        (consumer_id, last_event_id, last_event_timestamp, total_events_processed, processing_node, updated_at, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
     ON CONFLICT(consumer_id) DO UPDATE SET
        last_event_id = excluded.last_event_id,
        last_event_timestamp = excluded.last_event_timestamp,
        total_events_processed = excluded.total_events_processed,
        processing_node = excluded.processing_node,
        updated_at = excluded.updated_at";

const MONOTONIC_CONDITION: &str =
    " WHERE excluded.last_event_id >= event_processing_checkpoint.last_event_id";

/// Checkpoint rows in `event_processing_checkpoint`, one per consumer.
pub struct SqliteCheckpointStore<'c> {
    conn: &'c Connection,
    guard: CheckpointGuard,
}

/// Raw text columns, converted once the row has been read.
struct RawCheckpoint {
    consumer_id: String,
    last_event_id: i64,
    last_event_timestamp: Option<String>,
    total_events_processed: i64,
    processing_node: String,
    updated_at: String,
    created_at: String,
}

impl<'c> SqliteCheckpointStore<'c> {
    pub fn new(conn: &'c Connection, guard: CheckpointGuard) -> Self {
        Self { conn, guard }
    }

    pub fn list(&self) -> Result<Vec<Checkpoint>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY consumer_id ASC"))?;
        let raws = stmt
            .query_map([], raw_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawCheckpoint::into_checkpoint).collect()
    }

    /// Deletes the checkpoint for `consumer_id`. The next cycle for that
    /// consumer starts as a first run. Returns whether a row existed.
    pub fn reset(&self, consumer_id: &str) -> Result<bool, StoreError> {
        let deleted = self.conn.execute(
            "DELETE FROM event_processing_checkpoint WHERE consumer_id = ?1",
            params![consumer_id],
        )?;
        info!(consumer_id, existed = deleted > 0, "checkpoint reset");
        Ok(deleted > 0)
    }

    fn stored_event_id(&self, consumer_id: &str) -> Result<Option<i64>, StoreError> {
        self.conn
            .query_row(
                "SELECT last_event_id FROM event_processing_checkpoint WHERE consumer_id = ?1",
                params![consumer_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }
}

impl CheckpointStore for SqliteCheckpointStore<'_> {
    fn load(&self, consumer_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let raw = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE consumer_id = ?1"),
                params![consumer_id],
                raw_from_row,
            )
            .optional()?;

        let Some(raw) = raw else {
            info!(consumer_id, "no checkpoint found for consumer");
            return Ok(None);
        };
        let checkpoint = raw.into_checkpoint()?;
        info!(
            consumer_id,
            last_event_id = checkpoint.last_event_id,
            last_event_timestamp = ?checkpoint.last_event_timestamp,
            total_events_processed = checkpoint.total_events_processed,
            processing_node = %checkpoint.processing_node,
            "loaded checkpoint"
        );
        Ok(Some(checkpoint))
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let sql = match self.guard {
            CheckpointGuard::Overwrite => UPSERT.to_string(),
            CheckpointGuard::Monotonic => format!("{UPSERT}{MONOTONIC_CONDITION}"),
        };
        let now = schema::format_timestamp(&Utc::now());
        let changed = self.conn.execute(
            &sql,
            params![
                checkpoint.consumer_id,
                checkpoint.last_event_id,
                checkpoint
                    .last_event_timestamp
                    .as_ref()
                    .map(schema::format_timestamp),
                checkpoint.total_events_processed,
                checkpoint.processing_node,
                now,
            ],
        )?;

        if changed == 0 {
            let stored = self.stored_event_id(&checkpoint.consumer_id)?.unwrap_or(0);
            return Err(StoreError::Stale {
                consumer_id: checkpoint.consumer_id.clone(),
                stored,
                attempted: checkpoint.last_event_id,
            });
        }

        debug!(
            consumer_id = %checkpoint.consumer_id,
            last_event_id = checkpoint.last_event_id,
            total_events_processed = checkpoint.total_events_processed,
            processing_node = %checkpoint.processing_node,
            "saved checkpoint"
        );
        Ok(())
    }
}

fn raw_from_row(row: &Row<'_>) -> rusqlite::Result<RawCheckpoint> {
    Ok(RawCheckpoint {
        consumer_id: row.get(0)?,
        last_event_id: row.get(1)?,
        last_event_timestamp: row.get(2)?,
        total_events_processed: row.get(3)?,
        processing_node: row.get(4)?,
        updated_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl RawCheckpoint {
    fn into_checkpoint(self) -> Result<Checkpoint, StoreError> {
        let parse = |field: &'static str, raw: &str| -> Result<DateTime<Utc>, StoreError> {
            schema::parse_timestamp(raw).ok_or_else(|| StoreError::Corrupt {
                consumer_id: self.consumer_id.clone(),
                field,
                raw: raw.to_string(),
            })
        };
        let last_event_timestamp = self
            .last_event_timestamp
            .as_deref()
            .map(|raw| parse("last_event_timestamp", raw))
            .transpose()?;
        let updated_at = parse("updated_at", &self.updated_at)?;
        let created_at = parse("created_at", &self.created_at)?;

        Ok(Checkpoint {
            consumer_id: self.consumer_id,
            last_event_id: self.last_event_id,
            last_event_timestamp,
            total_events_processed: self.total_events_processed,
            processing_node: self.processing_node,
            updated_at: Some(updated_at),
            created_at: Some(created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn conn() -> Connection {
        let conn = schema::open(":memory:", &[]).unwrap();
        schema::migrate(&conn).unwrap();
        conn
    }

    fn checkpoint(consumer: &str, last_event_id: i64, total: i64) -> Checkpoint {
        Checkpoint {
            consumer_id: consumer.to_string(),
            last_event_id,
            last_event_timestamp: Some(Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()),
            total_events_processed: total,
            processing_node: "node-a".to_string(),
            updated_at: None,
            created_at: None,
        }
    }

    #[test]
    fn load_missing_consumer_is_not_an_error() {
        let conn = conn();
        let store = SqliteCheckpointStore::new(&conn, CheckpointGuard::Overwrite);
        assert!(store.load("nobody").unwrap().is_none());
    }

    #[test]
    fn save_inserts_then_overwrites() {
        let conn = conn();
        let store = SqliteCheckpointStore::new(&conn, CheckpointGuard::Overwrite);

        store.save(&checkpoint("c1", 10, 10)).unwrap();
        let first = store.load("c1").unwrap().unwrap();
        assert_eq!(first.last_event_id, 10);
        assert_eq!(first.processing_node, "node-a");
        assert_eq!(
            first.last_event_timestamp,
            Some(Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap())
        );

        let mut next = checkpoint("c1", 25, 25);
        next.processing_node = "node-b".to_string();
        store.save(&next).unwrap();
        let second = store.load("c1").unwrap().unwrap();
        assert_eq!(second.last_event_id, 25);
        assert_eq!(second.total_events_processed, 25);
        assert_eq!(second.processing_node, "node-b");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn overwrite_lets_last_writer_win() {
        let conn = conn();
        let store = SqliteCheckpointStore::new(&conn, CheckpointGuard::Overwrite);
        store.save(&checkpoint("c1", 50, 50)).unwrap();
        store.save(&checkpoint("c1", 20, 20)).unwrap();
        assert_eq!(store.load("c1").unwrap().unwrap().last_event_id, 20);
    }

    #[test]
    fn monotonic_guard_refuses_to_move_backwards() {
        let conn = conn();
        let store = SqliteCheckpointStore::new(&conn, CheckpointGuard::Monotonic);
        store.save(&checkpoint("c1", 50, 50)).unwrap();
        store.save(&checkpoint("c1", 50, 50)).unwrap();

        let err = store.save(&checkpoint("c1", 20, 70)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Stale {
                stored: 50,
                attempted: 20,
                ..
            }
        ));
        assert_eq!(store.load("c1").unwrap().unwrap().last_event_id, 50);

        store.save(&checkpoint("c1", 60, 60)).unwrap();
        assert_eq!(store.load("c1").unwrap().unwrap().last_event_id, 60);
    }

    #[test]
    fn consumers_are_independent_and_listed_in_order() {
        let conn = conn();
        let store = SqliteCheckpointStore::new(&conn, CheckpointGuard::Overwrite);
        store.save(&checkpoint("b", 2, 2)).unwrap();
        store.save(&checkpoint("a", 1, 1)).unwrap();
        let ids = store
            .list()
            .unwrap()
            .into_iter()
            .map(|c| (c.consumer_id, c.last_event_id))
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    }

    #[test]
    fn reset_deletes_only_the_named_consumer() {
        let conn = conn();
        let store = SqliteCheckpointStore::new(&conn, CheckpointGuard::Overwrite);
        store.save(&checkpoint("a", 1, 1)).unwrap();
        store.save(&checkpoint("b", 2, 2)).unwrap();
        assert!(store.reset("a").unwrap());
        assert!(!store.reset("a").unwrap());
        assert!(store.load("a").unwrap().is_none());
        assert!(store.load("b").unwrap().is_some());
    }

    #[test]
    fn unparsable_stored_timestamp_is_reported() {
        let conn = conn();
        conn.execute(
            "INSERT INTO event_processing_checkpoint
             (consumer_id, last_event_id, last_event_timestamp, total_events_processed, processing_node, updated_at, created_at)
             VALUES ('c1', 1, 'garbage', 1, NULL, '2026-01-01 00:00:00', '2026-01-01 00:00:00')",
            [],
        )
        .unwrap();
        let store = SqliteCheckpointStore::new(&conn, CheckpointGuard::Overwrite);
        let err = store.load("c1").unwrap_err();
        assert!(format!("{err}").contains("last_event_timestamp"));
    }
}
