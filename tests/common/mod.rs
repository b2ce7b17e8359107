#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use eventsproc::checkpoint::{Checkpoint, CheckpointStore};
use eventsproc::config::AttachedSchema;
use eventsproc::error::{DeliveryError, QueryError, StoreError};
use eventsproc::events::reader::EventSource;
use eventsproc::events::{EventRecord, QueryOptions, schema};
use eventsproc::run::CancelToken;
use eventsproc::sink::DeliverySink;
use rusqlite::{Connection, params};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 28, 10, 0, 0).unwrap()
}

/// In-memory events database with an attached in-memory `idp` schema.
pub fn fixture_db() -> Connection {
    let conn = schema::open(
        ":memory:",
        &[AttachedSchema {
            schema: "idp".to_string(),
            path: ":memory:".to_string(),
        }],
    )
    .unwrap();
    schema::migrate(&conn).unwrap();
    conn.execute_batch(
        "
        CREATE TABLE events (
            id INTEGER PRIMARY KEY,
            timestamp TEXT NOT NULL,
            activity INTEGER NOT NULL,
            initiator_id TEXT,
            target_id TEXT,
            account_id TEXT,
            meta TEXT
        );
        CREATE TABLE users (
            id TEXT PRIMARY KEY,
            email TEXT,
            name TEXT
        );
        CREATE TABLE idp.okta_users (
            id TEXT PRIMARY KEY,
            email TEXT
        );
        CREATE TABLE idp.directory (
            id TEXT PRIMARY KEY,
            email TEXT
        );
        ",
    )
    .unwrap();
    conn
}

pub struct EventRow<'a> {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub activity: i64,
    pub initiator_id: Option<&'a str>,
    pub target_id: Option<&'a str>,
    pub account_id: Option<&'a str>,
    pub meta: Option<&'a str>,
}

impl EventRow<'_> {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            timestamp: base_time() + Duration::seconds(id),
            activity: 2,
            initiator_id: Some("user-1"),
            target_id: Some("peer-1"),
            account_id: Some("acc-1"),
            meta: Some("{}"),
        }
    }
}

pub fn insert_event(conn: &Connection, row: &EventRow<'_>) {
    conn.execute(
        "INSERT INTO events (id, timestamp, activity, initiator_id, target_id, account_id, meta)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            row.id,
            schema::format_timestamp(&row.timestamp),
            row.activity,
            row.initiator_id,
            row.target_id,
            row.account_id,
            row.meta,
        ],
    )
    .unwrap();
}

pub fn insert_events(conn: &Connection, ids: &[i64]) {
    for id in ids {
        insert_event(conn, &EventRow::new(*id));
    }
}

pub fn insert_user(conn: &Connection, table: &str, id: &str, email: Option<&str>) {
    conn.execute(
        &format!("INSERT INTO {table} (id, email) VALUES (?1, ?2)"),
        params![id, email],
    )
    .unwrap();
}

pub fn insert_netbird_user(conn: &Connection, id: &str, email: Option<&str>, name: Option<&str>) {
    conn.execute(
        "INSERT INTO users (id, email, name) VALUES (?1, ?2, ?3)",
        params![id, email, name],
    )
    .unwrap();
}

pub fn event(id: i64) -> EventRecord {
    EventRecord {
        id,
        timestamp: base_time() + Duration::seconds(id),
        activity: 2,
        activity_name: "User joined".to_string(),
        activity_code: "user.join".to_string(),
        initiator_id: "user-1".to_string(),
        target_id: "peer-1".to_string(),
        account_id: "acc-1".to_string(),
        meta: "{}".to_string(),
        initiator_email: "user-1".to_string(),
        target_email: "peer-1".to_string(),
    }
}

pub fn events(ids: &[i64]) -> Vec<EventRecord> {
    ids.iter().copied().map(event).collect()
}

/// Replays scripted fetch results in order, then returns empty batches.
#[derive(Default)]
pub struct ScriptedSource {
    script: RefCell<VecDeque<Result<Vec<EventRecord>, QueryError>>>,
    calls: RefCell<Vec<QueryOptions>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<EventRecord>, QueryError>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            calls: RefCell::default(),
        }
    }

    pub fn batches(batches: Vec<Vec<EventRecord>>) -> Self {
        Self::new(batches.into_iter().map(Ok).collect())
    }

    pub fn calls(&self) -> Vec<QueryOptions> {
        self.calls.borrow().clone()
    }
}

impl EventSource for ScriptedSource {
    fn fetch(&self, opts: &QueryOptions) -> Result<Vec<EventRecord>, QueryError> {
        self.calls.borrow_mut().push(opts.clone());
        self.script.borrow_mut().pop_front().unwrap_or(Ok(Vec::new()))
    }
}

/// Checkpoints kept in a map; saves can be made to fail.
#[derive(Default)]
pub struct MemoryStore {
    rows: RefCell<BTreeMap<String, Checkpoint>>,
    pub fail_load: Cell<bool>,
    pub fail_save: Cell<bool>,
    saves: Cell<usize>,
}

impl MemoryStore {
    pub fn with(checkpoint: Checkpoint) -> Self {
        let store = Self::default();
        store
            .rows
            .borrow_mut()
            .insert(checkpoint.consumer_id.clone(), checkpoint);
        store
    }

    pub fn get(&self, consumer_id: &str) -> Option<Checkpoint> {
        self.rows.borrow().get(consumer_id).cloned()
    }

    pub fn saves(&self) -> usize {
        self.saves.get()
    }
}

impl CheckpointStore for MemoryStore {
    fn load(&self, consumer_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        if self.fail_load.get() {
            return Err(StoreError::Sql(rusqlite::Error::QueryReturnedNoRows));
        }
        Ok(self.get(consumer_id))
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        if self.fail_save.get() {
            return Err(StoreError::Sql(rusqlite::Error::QueryReturnedNoRows));
        }
        self.saves.set(self.saves.get() + 1);
        self.rows
            .borrow_mut()
            .insert(checkpoint.consumer_id.clone(), checkpoint.clone());
        Ok(())
    }
}

/// Records delivered ids per batch. Can fail, skip records, or cancel a
/// token after a number of deliveries.
#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Vec<Vec<i64>>,
    pub fail: bool,
    pub skip: Vec<i64>,
    pub cancel_after: Option<(usize, CancelToken)>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn all_ids(&self) -> Vec<i64> {
        self.delivered.iter().flatten().copied().collect()
    }
}

impl DeliverySink for RecordingSink {
    fn deliver(&mut self, batch: &[EventRecord]) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Rejected("downstream unavailable".to_string()));
        }
        self.delivered.push(batch.iter().map(|e| e.id).collect());
        if let Some((after, token)) = &self.cancel_after
            && self.delivered.len() >= *after
        {
            token.cancel();
        }
        let skipped = batch
            .iter()
            .map(|e| e.id)
            .filter(|id| self.skip.contains(id))
            .collect::<Vec<_>>();
        if skipped.is_empty() {
            Ok(())
        } else {
            Err(DeliveryError::RecordsSkipped { event_ids: skipped })
        }
    }
}
