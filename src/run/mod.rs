pub mod cancel;
mod r#loop;
pub mod scheduler;

use crate::checkpoint::{Checkpoint, CheckpointStore, SqliteCheckpointStore};
use crate::config::Config;
use crate::error::ConfigError;
use crate::events::enrichment::EnrichmentStrategy;
use crate::events::reader::{EventReader, EventSource};
use crate::events::{QueryOptions, SortKey, schema};
use crate::sink::{DeliverySink, NdjsonSink};
use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use std::time::Duration;
use tracing::{info, warn};

pub use cancel::CancelToken;

/// Fixed inputs for every cycle of one processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorSettings {
    pub consumer_id: String,
    pub batch_size: usize,
    /// First-run window; `None` processes all history.
    pub lookback: Option<chrono::Duration>,
    pub sort_key: SortKey,
    /// Recorded on every checkpoint this processor writes.
    pub node_name: String,
}

impl ProcessorSettings {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let lookback = match cfg.lookback_hours {
            0 => None,
            hours => Some(
                i64::try_from(hours)
                    .ok()
                    .and_then(chrono::Duration::try_hours)
                    .ok_or_else(|| {
                        ConfigError::invalid("lookback_hours", format!("{hours} is out of range"))
                    })?,
            ),
        };
        Ok(Self {
            consumer_id: cfg.consumer_id.clone(),
            batch_size: cfg.batch_size,
            lookback,
            sort_key: cfg.sort_key,
            node_name: cfg.node_name.clone().unwrap_or_else(local_node_name),
        })
    }
}

/// Outcome of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub batches: usize,
    pub events_delivered: usize,
    /// Records the sink dropped while still accepting their batch.
    pub skipped_event_ids: Vec<i64>,
    /// Position after the cycle; an uncommitted initial checkpoint when the
    /// consumer has never delivered anything.
    pub checkpoint: Checkpoint,
}

/// Drives fetch, deliver and commit for one consumer identity.
pub struct Processor<R, C, D> {
    source: R,
    store: C,
    sink: D,
    settings: ProcessorSettings,
}

impl<R, C, D> Processor<R, C, D>
where
    R: EventSource,
    C: CheckpointStore,
    D: DeliverySink,
{
    pub fn new(source: R, store: C, sink: D, settings: ProcessorSettings) -> Self {
        Self {
            source,
            store,
            sink,
            settings,
        }
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }
}

/// Hostname from `HOSTNAME`, then `/etc/hostname`, else `unknown`.
pub fn local_node_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| {
            warn!("failed to determine hostname, using `unknown`");
            "unknown".to_string()
        })
}

fn open_storage(cfg: &Config) -> Result<Connection> {
    let conn = schema::open(&cfg.database_url, &cfg.attach)
        .with_context(|| format!("open database {}", cfg.database_url))?;
    schema::migrate(&conn).context("create checkpoint table")?;
    Ok(conn)
}

/// Runs the processor against stdout until the schedule ends or a shutdown
/// signal arrives.
pub fn execute_run(cfg: &Config) -> Result<()> {
    let settings = ProcessorSettings::from_config(cfg)?;
    info!(
        platform = %cfg.platform,
        region = %cfg.region,
        consumer_id = %settings.consumer_id,
        batch_size = settings.batch_size,
        lookback_hours = cfg.lookback_hours,
        polling_interval = cfg.polling_interval_secs,
        sort_key = ?settings.sort_key,
        checkpoint_guard = ?cfg.checkpoint_guard,
        processing_node = %settings.node_name,
        "starting events processor"
    );

    let conn = open_storage(cfg)?;
    let strategy = EnrichmentStrategy::resolve(&cfg.email_enrichment, &cfg.attach);
    info!(source = strategy.tag(), "email enrichment resolved");

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal, finishing current batch");
        handler_token.cancel();
    })
    .context("install signal handler")?;

    let mut processor = Processor::new(
        EventReader::new(&conn, strategy),
        SqliteCheckpointStore::new(&conn, cfg.checkpoint_guard),
        NdjsonSink::stdout(),
        settings,
    );
    scheduler::run_scheduled(
        &mut processor,
        Duration::from_secs(cfg.polling_interval_secs),
        &cancel,
    )?;
    info!("events processor stopped");
    Ok(())
}

/// Prints the number of events matching `opts`.
pub fn count_events(cfg: &Config, opts: &QueryOptions) -> Result<()> {
    let conn = open_storage(cfg)?;
    let reader = EventReader::new(&conn, EnrichmentStrategy::Disabled);
    let count = reader.count(opts).context("count events")?;
    println!("{count}");
    Ok(())
}

pub fn show_checkpoint(cfg: &Config, consumer_id: Option<&str>) -> Result<()> {
    let conn = open_storage(cfg)?;
    let store = SqliteCheckpointStore::new(&conn, cfg.checkpoint_guard);
    let consumer_id = consumer_id.unwrap_or(&cfg.consumer_id);
    match store.load(consumer_id)? {
        Some(checkpoint) => println!("{}", serde_json::to_string_pretty(&checkpoint)?),
        None => println!("no checkpoint for `{consumer_id}`"),
    }
    Ok(())
}

pub fn list_checkpoints(cfg: &Config) -> Result<()> {
    let conn = open_storage(cfg)?;
    let store = SqliteCheckpointStore::new(&conn, cfg.checkpoint_guard);
    let checkpoints = store.list()?;
    println!("{}", serde_json::to_string_pretty(&checkpoints)?);
    Ok(())
}

/// Deletes a consumer's checkpoint so its next run starts from the lookback
/// window. Requires explicit confirmation.
pub fn reset_checkpoint(cfg: &Config, consumer_id: &str, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("refusing to reset checkpoint for `{consumer_id}` without --yes");
    }
    let conn = open_storage(cfg)?;
    let store = SqliteCheckpointStore::new(&conn, cfg.checkpoint_guard);
    if store.reset(consumer_id)? {
        println!("checkpoint for `{consumer_id}` deleted");
    } else {
        println!("no checkpoint for `{consumer_id}`");
    }
    Ok(())
}
