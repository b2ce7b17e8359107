use crate::error::QueryError;
use crate::events::enrichment::EnrichmentStrategy;
use crate::events::{EventRecord, QueryOptions, SortKey, activity, schema};
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params_from_iter};
use tracing::debug;

/// Anything the processor can pull event batches from.
pub trait EventSource {
    fn fetch(&self, opts: &QueryOptions) -> Result<Vec<EventRecord>, QueryError>;
}

/// Reads events over a borrowed SQLite connection.
pub struct EventReader<'c> {
    conn: &'c Connection,
    strategy: EnrichmentStrategy,
}

impl<'c> EventReader<'c> {
    pub fn new(conn: &'c Connection, strategy: EnrichmentStrategy) -> Self {
        Self { conn, strategy }
    }

    pub fn strategy(&self) -> &EnrichmentStrategy {
        &self.strategy
    }

    pub fn fetch(&self, opts: &QueryOptions) -> Result<Vec<EventRecord>, QueryError> {
        let (sql, args) = build_select(&self.strategy, opts);
        debug!(query = %sql, args = ?args, "executing events query");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(args))?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(decode_row(row)?);
        }

        debug!(count = events.len(), "fetched events");
        Ok(events)
    }

    /// Counts rows matching the filters of `opts`, ignoring pagination.
    pub fn count(&self, opts: &QueryOptions) -> Result<u64, QueryError> {
        let (sql, args) = build_count(opts);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(args), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

impl EventSource for EventReader<'_> {
    fn fetch(&self, opts: &QueryOptions) -> Result<Vec<EventRecord>, QueryError> {
        EventReader::fetch(self, opts)
    }
}

/// Stored timestamps mix RFC 3339 (with or without offset) and SQLite's
/// `YYYY-MM-DD HH:MM:SS`, so time filters and ordering compare Julian day
/// numbers rather than text.
const TIME_ORDER: &str = "julianday(e.timestamp)";

/// Filter predicates in their fixed order, numbered from `?1`.
fn where_clause(opts: &QueryOptions, args: &mut Vec<Value>) -> String {
    let mut conditions = Vec::new();
    let mut bind = |condition: &str, value: Value| {
        args.push(value);
        conditions.push(condition.replace("?", &format!("?{}", args.len())));
    };

    if let Some(account) = opts.account_id.as_deref().filter(|a| !a.is_empty()) {
        bind("e.account_id = ?", Value::Text(account.to_string()));
    }
    if let Some(start) = &opts.start_time {
        bind(
            &format!("{TIME_ORDER} >= julianday(?)"),
            Value::Text(schema::format_timestamp(start)),
        );
    }
    if let Some(end) = &opts.end_time {
        bind(
            &format!("{TIME_ORDER} <= julianday(?)"),
            Value::Text(schema::format_timestamp(end)),
        );
    }
    if let Some(activity) = opts.activity {
        bind("e.activity = ?", Value::Integer(activity));
    }
    if let Some(min_id) = opts.min_event_id {
        bind("e.id > ?", Value::Integer(min_id));
    }

    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

pub(crate) fn build_select(
    strategy: &EnrichmentStrategy,
    opts: &QueryOptions,
) -> (String, Vec<Value>) {
    let mut args = Vec::new();
    let mut sql = strategy.select_sql();
    sql.push_str(&where_clause(opts, &mut args));

    let direction = if opts.ascending { "ASC" } else { "DESC" };
    match opts.sort_key {
        SortKey::Timestamp => {
            sql.push_str(&format!(" ORDER BY {TIME_ORDER} {direction}, e.id {direction}"))
        }
        SortKey::Id => sql.push_str(&format!(" ORDER BY e.id {direction}")),
    }

    args.push(Value::Integer(opts.effective_limit() as i64));
    args.push(Value::Integer(opts.offset as i64));
    sql.push_str(&format!(" LIMIT ?{} OFFSET ?{}", args.len() - 1, args.len()));
    (sql, args)
}

pub(crate) fn build_count(opts: &QueryOptions) -> (String, Vec<Value>) {
    let mut args = Vec::new();
    let mut sql = "SELECT COUNT(*) FROM events e".to_string();
    sql.push_str(&where_clause(opts, &mut args));
    (sql, args)
}

fn decode_row(row: &Row<'_>) -> Result<EventRecord, QueryError> {
    let id: i64 = row.get(0)?;
    let raw_ts: String = row.get(1)?;
    let timestamp =
        schema::parse_timestamp(&raw_ts).ok_or(QueryError::Timestamp { id, raw: raw_ts })?;
    let activity: i64 = row.get(2)?;
    let text = |idx: usize| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
    };
    let (activity_name, activity_code) = activity::describe(activity);

    Ok(EventRecord {
        id,
        timestamp,
        activity,
        activity_name: activity_name.to_string(),
        activity_code: activity_code.to_string(),
        initiator_id: text(3)?,
        target_id: text(4)?,
        account_id: text(5)?,
        meta: text(6)?,
        initiator_email: text(7)?,
        target_email: text(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn no_filters_only_binds_pagination() {
        let (sql, args) = build_select(
            &EnrichmentStrategy::Disabled,
            &QueryOptions {
                limit: 10,
                ..Default::default()
            },
        );
        assert!(!sql.contains("WHERE"));
        assert!(
            sql.ends_with("ORDER BY julianday(e.timestamp) DESC, e.id DESC LIMIT ?1 OFFSET ?2")
        );
        assert_eq!(args, vec![Value::Integer(10), Value::Integer(0)]);
    }

    #[test]
    fn predicates_follow_fixed_order() {
        let opts = QueryOptions {
            limit: 5,
            offset: 15,
            account_id: Some("acc-1".to_string()),
            start_time: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            end_time: Some(Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap()),
            activity: Some(49),
            min_event_id: Some(100),
            ascending: true,
            sort_key: SortKey::Timestamp,
        };
        let (sql, args) = build_select(&EnrichmentStrategy::Auto, &opts);
        assert!(sql.contains(
            " WHERE e.account_id = ?1 AND julianday(e.timestamp) >= julianday(?2) \
             AND julianday(e.timestamp) <= julianday(?3) AND e.activity = ?4 AND e.id > ?5 \
             ORDER BY julianday(e.timestamp) ASC, e.id ASC LIMIT ?6 OFFSET ?7"
        ));
        assert_eq!(args.len(), 7);
        assert_eq!(args[0], Value::Text("acc-1".to_string()));
        assert_eq!(args[1], Value::Text("2026-01-01T00:00:00.000000Z".to_string()));
        assert_eq!(args[3], Value::Integer(49));
        assert_eq!(args[4], Value::Integer(100));
        assert_eq!(args[5], Value::Integer(5));
        assert_eq!(args[6], Value::Integer(15));
    }

    #[test]
    fn zero_limit_uses_default_page_size() {
        let (_, args) = build_select(&EnrichmentStrategy::Auto, &QueryOptions::default());
        assert_eq!(args[0], Value::Integer(1000));
    }

    #[test]
    fn id_sort_orders_by_identifier_only() {
        let (sql, _) = build_select(
            &EnrichmentStrategy::Disabled,
            &QueryOptions {
                ascending: true,
                sort_key: SortKey::Id,
                ..Default::default()
            },
        );
        assert!(sql.contains("ORDER BY e.id ASC LIMIT"));
    }

    #[test]
    fn account_filter_is_bound_not_interpolated() {
        let opts = QueryOptions {
            account_id: Some("x' OR '1'='1".to_string()),
            ..Default::default()
        };
        let (sql, args) = build_select(&EnrichmentStrategy::Disabled, &opts);
        assert!(!sql.contains("OR '1'='1"));
        assert_eq!(args[0], Value::Text("x' OR '1'='1".to_string()));
    }

    #[test]
    fn count_has_no_pagination() {
        let (sql, args) = build_count(&QueryOptions {
            limit: 10,
            offset: 3,
            activity: Some(2),
            ..Default::default()
        });
        assert_eq!(sql, "SELECT COUNT(*) FROM events e WHERE e.activity = ?1");
        assert_eq!(args, vec![Value::Integer(2)]);
    }
}
