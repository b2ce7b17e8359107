use crate::error::DeliveryError;
use crate::events::EventRecord;
use crate::sink::DeliverySink;
use chrono::SecondsFormat;
use serde_json::{Map, Value, json};
use std::io::{self, Write};
use tracing::warn;

/// Writes one flattened JSON object per event, one per line.
pub struct NdjsonSink<W: Write> {
    out: W,
}

impl NdjsonSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DeliverySink for NdjsonSink<W> {
    /// Building a JSON object from string and integer fields only fails on a
    /// serializer error, so in practice this sink writes every record or
    /// returns an I/O error. [`DeliveryError::RecordsSkipped`] is kept for
    /// sinks with per-record rejection.
    fn deliver(&mut self, batch: &[EventRecord]) -> Result<(), DeliveryError> {
        let mut skipped = Vec::new();
        for ev in batch {
            let line = match format_record(ev) {
                Ok(line) => line,
                Err(err) => {
                    warn!(event_id = ev.id, error = %err, "failed to serialise event, skipping");
                    skipped.push(ev.id);
                    continue;
                }
            };
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()?;

        if skipped.is_empty() {
            Ok(())
        } else {
            Err(DeliveryError::RecordsSkipped { event_ids: skipped })
        }
    }
}

/// Serialises an event with its metadata keys flattened as `meta_<key>`.
///
/// Metadata that is not a JSON object is kept verbatim under
/// `meta_unparsable`. Empty actor fields are omitted.
pub fn format_record(ev: &EventRecord) -> serde_json::Result<String> {
    let mut data = Map::new();
    data.insert("log_type".into(), json!("application"));
    data.insert("event_source".into(), json!("netbird"));
    data.insert("event_id".into(), json!(ev.id));
    data.insert(
        "timestamp".into(),
        json!(ev.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    data.insert("activity".into(), json!(ev.activity));
    data.insert("activity_name".into(), json!(ev.activity_name));
    data.insert("activity_code".into(), json!(ev.activity_code));
    data.insert("account_id".into(), json!(ev.account_id));

    for (key, value) in [
        ("initiator_id", &ev.initiator_id),
        ("initiator_email", &ev.initiator_email),
        ("target_id", &ev.target_id),
        ("target_email", &ev.target_email),
    ] {
        if !value.is_empty() {
            data.insert(key.into(), json!(value));
        }
    }

    if !ev.meta.is_empty() {
        match serde_json::from_str::<Map<String, Value>>(&ev.meta) {
            Ok(meta) => {
                for (key, value) in meta {
                    data.insert(format!("meta_{key}"), value);
                }
            }
            Err(_) => {
                data.insert("meta_unparsable".into(), json!(ev.meta));
            }
        }
    }

    serde_json::to_string(&Value::Object(data))
}
