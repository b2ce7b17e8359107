use crate::checkpoint::CheckpointGuard;
use crate::error::ConfigError;
use crate::events::SortKey;
use crate::events::enrichment::{self, IDP_SCHEMA};
use crate::events::schema::is_identifier;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/eventsproc/config.toml";
const ENV_PREFIX: &str = "EP_";
/// Upper bound on the first-run window, one hundred years.
pub const MAX_LOOKBACK_HOURS: u64 = 100 * 365 * 24;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite database holding the events and checkpoint tables.
    pub database_url: String,
    pub attach: Vec<AttachedSchema>,
    pub platform: String,
    pub region: String,
    pub consumer_id: String,
    pub node_name: Option<String>,
    pub log_level: String,
    pub batch_size: usize,
    /// First-run window; zero processes all history.
    pub lookback_hours: u64,
    /// Seconds between cycles; zero runs a single cycle.
    pub polling_interval_secs: u64,
    pub sort_key: SortKey,
    pub checkpoint_guard: CheckpointGuard,
    pub email_enrichment: EnrichmentConfig,
}

/// Extra database file attached under a schema alias, e.g. `idp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedSchema {
    pub schema: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    /// `auto`, `idp_okta_users`, `netbird_users`, `custom` or `none`.
    pub source: String,
    pub custom_schema: Option<String>,
    pub custom_table: Option<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source: "auto".to_string(),
            custom_schema: None,
            custom_table: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    database_url: Option<String>,
    attach: Option<Vec<RawAttachedSchema>>,
    platform: Option<String>,
    region: Option<String>,
    consumer_id: Option<String>,
    node_name: Option<String>,
    log_level: Option<String>,
    batch_size: Option<i64>,
    lookback_hours: Option<i64>,
    polling_interval: Option<i64>,
    sort_key: Option<String>,
    checkpoint_guard: Option<String>,
    email_enrichment: Option<RawEnrichmentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawAttachedSchema {
    schema: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawEnrichmentConfig {
    enabled: Option<bool>,
    source: Option<String>,
    custom_schema: Option<String>,
    custom_table: Option<String>,
}

/// Loads `path` (when given) and applies `EP_*` environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

pub fn load_config_with_env<F>(path: Option<&Path>, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut raw = match path {
        Some(path) => read_raw(path)?,
        None => RawConfig::default(),
    };
    apply_env(&mut raw, &env)?;
    validate_config(raw)
}

fn read_raw(path: &Path) -> Result<RawConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: PathBuf::from(path),
        source,
    })
}

fn apply_env<F>(raw: &mut RawConfig, env: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| env(&format!("{ENV_PREFIX}{key}"));
    let int = |key: &str| -> Result<Option<i64>, ConfigError> {
        var(key)
            .map(|v| {
                v.trim()
                    .parse::<i64>()
                    .map_err(|_| {
                        ConfigError::invalid(
                            key.to_ascii_lowercase(),
                            format!("`{v}` is not an integer"),
                        )
                    })
            })
            .transpose()
    };

    let strings: [(&str, &mut Option<String>); 8] = [
        ("DATABASE_URL", &mut raw.database_url),
        ("PLATFORM", &mut raw.platform),
        ("REGION", &mut raw.region),
        ("CONSUMER_ID", &mut raw.consumer_id),
        ("NODE_NAME", &mut raw.node_name),
        ("LOG_LEVEL", &mut raw.log_level),
        ("SORT_KEY", &mut raw.sort_key),
        ("CHECKPOINT_GUARD", &mut raw.checkpoint_guard),
    ];
    for (key, slot) in strings {
        if let Some(value) = var(key) {
            *slot = Some(value);
        }
    }

    if let Some(v) = int("BATCH_SIZE")? {
        raw.batch_size = Some(v);
    }
    if let Some(v) = int("LOOKBACK_HOURS")? {
        raw.lookback_hours = Some(v);
    }
    if let Some(v) = int("POLLING_INTERVAL")? {
        raw.polling_interval = Some(v);
    }

    let enrichment = raw.email_enrichment.get_or_insert_with(Default::default);
    if let Some(v) = var("EMAIL_ENRICHMENT_ENABLED") {
        enrichment.enabled = Some(parse_bool(&v).ok_or_else(|| {
            ConfigError::invalid("email_enrichment.enabled", format!("`{v}` is not a boolean"))
        })?);
    }
    if let Some(v) = var("EMAIL_ENRICHMENT_SOURCE") {
        enrichment.source = Some(v);
    }
    if let Some(v) = var("EMAIL_ENRICHMENT_CUSTOM_SCHEMA") {
        enrichment.custom_schema = Some(v);
    }
    if let Some(v) = var("EMAIL_ENRICHMENT_CUSTOM_TABLE") {
        enrichment.custom_table = Some(v);
    }
    Ok(())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn sanitize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_negative(key: &str, value: Option<i64>, default: i64) -> Result<u64, ConfigError> {
    let value = value.unwrap_or(default);
    u64::try_from(value).map_err(|_| ConfigError::invalid(key, format!("{value} is negative")))
}

fn validate_config(raw: RawConfig) -> Result<Config, ConfigError> {
    let database_url =
        sanitize_optional(raw.database_url).ok_or(ConfigError::Missing("database_url"))?;
    let platform = sanitize_optional(raw.platform).unwrap_or_else(|| "sandbox".to_string());
    let region = sanitize_optional(raw.region).unwrap_or_else(|| "apac".to_string());
    let consumer_id = sanitize_optional(raw.consumer_id)
        .unwrap_or_else(|| format!("eventsproc-{platform}-{region}"));

    let batch_size = non_negative("batch_size", raw.batch_size, 1000)?;
    if batch_size == 0 {
        return Err(ConfigError::invalid("batch_size", "must be greater than zero"));
    }

    let sort_key = match sanitize_optional(raw.sort_key) {
        None => SortKey::default(),
        Some(v) => SortKey::parse(&v).ok_or_else(|| {
            ConfigError::invalid("sort_key", format!("`{v}`; expected `timestamp` or `id`"))
        })?,
    };
    let checkpoint_guard = match sanitize_optional(raw.checkpoint_guard) {
        None => CheckpointGuard::default(),
        Some(v) => CheckpointGuard::parse(&v).ok_or_else(|| {
            ConfigError::invalid(
                "checkpoint_guard",
                format!("`{v}`; expected `overwrite` or `monotonic`"),
            )
        })?,
    };

    let attach = raw
        .attach
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(idx, a)| validate_attached_schema(a, idx))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Config {
        database_url,
        platform,
        region,
        consumer_id,
        node_name: sanitize_optional(raw.node_name),
        log_level: sanitize_optional(raw.log_level).unwrap_or_else(|| "info".to_string()),
        batch_size: batch_size as usize,
        lookback_hours: lookback_hours(raw.lookback_hours)?,
        polling_interval_secs: non_negative("polling_interval", raw.polling_interval, 0)?,
        sort_key,
        checkpoint_guard,
        email_enrichment: validate_enrichment(
            raw.email_enrichment.unwrap_or_default(),
            &attach,
        )?,
        attach,
    })
}

fn lookback_hours(raw: Option<i64>) -> Result<u64, ConfigError> {
    let hours = non_negative("lookback_hours", raw, 24)?;
    if hours > MAX_LOOKBACK_HOURS {
        return Err(ConfigError::invalid(
            "lookback_hours",
            format!("{hours} exceeds the maximum of {MAX_LOOKBACK_HOURS}"),
        ));
    }
    Ok(hours)
}

fn validate_attached_schema(
    raw: RawAttachedSchema,
    idx: usize,
) -> Result<AttachedSchema, ConfigError> {
    let key = format!("attach[{idx}]");
    let schema = sanitize_optional(raw.schema)
        .ok_or_else(|| ConfigError::invalid(&key, "missing `schema`"))?;
    // `main` and `temp` are reserved by SQLite.
    if !is_identifier(&schema)
        || schema.eq_ignore_ascii_case("main")
        || schema.eq_ignore_ascii_case("temp")
    {
        return Err(ConfigError::invalid(
            &key,
            format!("`{schema}` is not a usable schema alias"),
        ));
    }
    let path =
        sanitize_optional(raw.path).ok_or_else(|| ConfigError::invalid(&key, "missing `path`"))?;
    Ok(AttachedSchema { schema, path })
}

fn validate_enrichment(
    raw: RawEnrichmentConfig,
    attach: &[AttachedSchema],
) -> Result<EnrichmentConfig, ConfigError> {
    let cfg = EnrichmentConfig {
        enabled: raw.enabled.unwrap_or(true),
        source: sanitize_optional(raw.source).unwrap_or_else(|| "auto".to_string()),
        custom_schema: sanitize_optional(raw.custom_schema),
        custom_table: sanitize_optional(raw.custom_table),
    };
    if let Some(schema) = &cfg.custom_schema
        && !is_identifier(schema)
    {
        return Err(ConfigError::invalid(
            "email_enrichment.custom_schema",
            format!("`{schema}` is not a plain identifier"),
        ));
    }
    if let Some(table) = &cfg.custom_table
        && !is_identifier(table)
    {
        return Err(ConfigError::invalid(
            "email_enrichment.custom_table",
            format!("`{table}` is not a plain identifier"),
        ));
    }
    if cfg.enabled && cfg.source == "custom" && cfg.custom_table.is_none() {
        return Err(ConfigError::invalid(
            "email_enrichment.custom_table",
            "required when source = \"custom\"",
        ));
    }
    if cfg.enabled
        && cfg.source == "idp_okta_users"
        && !enrichment::is_attached(attach, IDP_SCHEMA)
    {
        return Err(ConfigError::invalid(
            "email_enrichment.source",
            format!("`idp_okta_users` needs an [[attach]] entry with schema = \"{IDP_SCHEMA}\""),
        ));
    }
    if cfg.enabled
        && cfg.source == "custom"
        && let Some(schema) = &cfg.custom_schema
        && !enrichment::is_attached(attach, schema)
    {
        return Err(ConfigError::invalid(
            "email_enrichment.custom_schema",
            format!("`{schema}` is not an attached schema; add an [[attach]] entry for it"),
        ));
    }
    Ok(cfg)
}
