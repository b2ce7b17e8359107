use crate::config::AttachedSchema;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Result};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the events database and attaches the configured auxiliary schemas.
pub fn open(url: &str, attach: &[AttachedSchema]) -> Result<Connection> {
    let conn = Connection::open(url)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    for schema in attach {
        // Aliases cannot be bound as parameters; they are validated identifiers.
        conn.execute(
            &format!("ATTACH DATABASE ?1 AS {}", schema.schema),
            [schema.path.as_str()],
        )?;
    }
    Ok(conn)
}

/// Creates the checkpoint table. The events and identity tables belong to
/// the upstream producer and are never created here.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS event_processing_checkpoint (
            consumer_id TEXT PRIMARY KEY,
            last_event_id INTEGER NOT NULL,
            last_event_timestamp TEXT,
            total_events_processed INTEGER NOT NULL DEFAULT 0,
            processing_node TEXT,
            updated_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        ",
    )
}

/// Plain SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(raw: &str) -> bool {
    let mut chars = raw.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Fixed-width RFC 3339 so that text order matches time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts RFC 3339 and SQLite's `YYYY-MM-DD HH:MM:SS[.fff]` (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
