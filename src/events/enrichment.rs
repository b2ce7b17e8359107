//! Query shapes for resolving actor ids to display names.
//!
//! Each strategy renders the select list and `FROM` clause that follow the
//! base event projection. Resolution never fails a row: every display column
//! falls back to the raw actor id through `COALESCE`.

use crate::config::{AttachedSchema, EnrichmentConfig};
use std::fmt;
use tracing::warn;

/// Identity table with a single `email` display column.
/// Alias the identity-provider database must be attached under.
pub const IDP_SCHEMA: &str = "idp";
pub const OKTA_USERS_TABLE: &str = "idp.okta_users";
/// Identity table with `email` as primary and `name` as secondary display column.
pub const NETBIRD_USERS_TABLE: &str = "users";

const BASE_PROJECTION: &str =
    "SELECT e.id, e.timestamp, e.activity, e.initiator_id, e.target_id, e.account_id, e.meta";

/// Operator-supplied identity table, validated as plain identifiers when the
/// configuration is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedTable {
    pub schema: Option<String>,
    pub table: String,
}

impl fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.table),
            None => f.write_str(&self.table),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentStrategy {
    /// Both identity tables, coalesced in priority order.
    Auto,
    OktaUsers,
    NetbirdUsers,
    Custom(QualifiedTable),
    /// No join; display columns carry the raw actor ids.
    Disabled,
}

impl EnrichmentStrategy {
    /// Maps configuration to a strategy. Unknown source tags fall back to
    /// [`EnrichmentStrategy::Auto`], and `Auto` itself narrows to
    /// [`EnrichmentStrategy::NetbirdUsers`] when no `idp` schema is attached.
    pub fn resolve(cfg: &EnrichmentConfig, attached: &[AttachedSchema]) -> Self {
        if !cfg.enabled {
            return Self::Disabled;
        }
        match cfg.source.trim() {
            "auto" => Self::auto(attached),
            "idp_okta_users" => Self::OktaUsers,
            "netbird_users" => Self::NetbirdUsers,
            "none" => Self::Disabled,
            "custom" => match cfg.custom_table.as_deref().filter(|t| !t.is_empty()) {
                Some(table) => Self::Custom(QualifiedTable {
                    schema: cfg.custom_schema.clone().filter(|s| !s.is_empty()),
                    table: table.to_string(),
                }),
                None => {
                    warn!("custom email enrichment has no table, defaulting to auto");
                    Self::auto(attached)
                }
            },
            other => {
                warn!(source = other, "unknown email enrichment source, defaulting to auto");
                Self::auto(attached)
            }
        }
    }

    fn auto(attached: &[AttachedSchema]) -> Self {
        if is_attached(attached, IDP_SCHEMA) {
            Self::Auto
        } else {
            warn!(
                schema = IDP_SCHEMA,
                "identity provider schema not attached, enriching from netbird users only"
            );
            Self::NetbirdUsers
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::OktaUsers => "idp_okta_users",
            Self::NetbirdUsers => "netbird_users",
            Self::Custom(_) => "custom",
            Self::Disabled => "none",
        }
    }

    /// Projection and `FROM` clause, ready for a `WHERE` clause to be appended.
    pub fn select_sql(&self) -> String {
        match self {
            Self::Disabled => format!(
                "{BASE_PROJECTION},
    e.initiator_id AS initiator_email,
    e.target_id AS target_email
FROM events e"
            ),
            Self::OktaUsers => single_table_sql(OKTA_USERS_TABLE, &["email"]),
            Self::NetbirdUsers => single_table_sql(NETBIRD_USERS_TABLE, &["email", "name"]),
            Self::Custom(table) => single_table_sql(&table.to_string(), &["email"]),
            Self::Auto => format!(
                "{BASE_PROJECTION},
    COALESCE(okta.email, netbird.email, netbird.name, e.initiator_id) AS initiator_email,
    COALESCE(okta_target.email, netbird_target.email, netbird_target.name, e.target_id) AS target_email
FROM events e
LEFT JOIN {OKTA_USERS_TABLE} okta ON e.initiator_id = okta.id
LEFT JOIN {OKTA_USERS_TABLE} okta_target ON e.target_id = okta_target.id
LEFT JOIN {NETBIRD_USERS_TABLE} netbird ON e.initiator_id = netbird.id
LEFT JOIN {NETBIRD_USERS_TABLE} netbird_target ON e.target_id = netbird_target.id"
            ),
        }
    }
}

/// Whether `schema` is usable in a qualified table name: `main`, `temp` or an
/// attached alias. Aliases compare case-insensitively, as SQLite does.
pub fn is_attached(attached: &[AttachedSchema], schema: &str) -> bool {
    schema.eq_ignore_ascii_case("main")
        || schema.eq_ignore_ascii_case("temp")
        || attached.iter().any(|a| a.schema.eq_ignore_ascii_case(schema))
}

fn single_table_sql(table: &str, display_columns: &[&str]) -> String {
    let coalesce = |alias: &str, fallback: &str| {
        let mut parts = display_columns
            .iter()
            .map(|col| format!("{alias}.{col}"))
            .collect::<Vec<_>>();
        parts.push(fallback.to_string());
        format!("COALESCE({})", parts.join(", "))
    };
    format!(
        "{BASE_PROJECTION},
    {} AS initiator_email,
    {} AS target_email
FROM events e
LEFT JOIN {table} u1 ON e.initiator_id = u1.id
LEFT JOIN {table} u2 ON e.target_id = u2.id",
        coalesce("u1", "e.initiator_id"),
        coalesce("u2", "e.target_id"),
    )
}
