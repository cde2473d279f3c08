//! Table schemas.
//!
//! Every aggregate table carries its natural key as the primary key,
//! which is what makes incremental aggregation idempotent when paired
//! with the upsert-with-increment writes in `insert`.

use engine_core::Result;

use crate::client::{map_sqlx, EventStore};

/// Append-only raw event log.
///
/// `event_id` is the client-generated idempotency key; redelivery of
/// the same logical fact inserts nothing and triggers no rollup.
pub const CREATE_RAW_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS raw_events (
    event_id        TEXT PRIMARY KEY,
    tenant_id       INTEGER NOT NULL,
    event_type      TEXT NOT NULL,
    category        TEXT,
    action          TEXT,
    label           TEXT,
    numeric_value   REAL,
    session_id      TEXT,
    path            TEXT,
    device_type     TEXT NOT NULL DEFAULT 'unknown',
    browser         TEXT,
    referrer        TEXT,
    timestamp       TEXT NOT NULL,
    received_at     TEXT NOT NULL,
    extra           TEXT NOT NULL DEFAULT '{}'
)
"#;

pub const CREATE_RAW_EVENTS_IDX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_raw_events_tenant_ts
ON raw_events (tenant_id, timestamp)
"#;

/// Daily traffic/engagement rollup.
///
/// Canonical key granularity is (tenant, date, device); tenant/date
/// totals are summed across devices at read time.
pub const CREATE_DAILY_METRICS: &str = r#"
CREATE TABLE IF NOT EXISTS daily_metrics (
    tenant_id             INTEGER NOT NULL,
    date                  TEXT NOT NULL,
    device_type           TEXT NOT NULL DEFAULT 'unknown',
    page_views            INTEGER NOT NULL DEFAULT 0,
    unique_visitors       INTEGER NOT NULL DEFAULT 0,
    sessions              INTEGER NOT NULL DEFAULT 0,
    new_users             INTEGER NOT NULL DEFAULT 0,
    returning_users       INTEGER NOT NULL DEFAULT 0,
    content_interactions  INTEGER NOT NULL DEFAULT 0,
    bounce_sessions       INTEGER NOT NULL DEFAULT 0,
    total_session_seconds REAL NOT NULL DEFAULT 0,
    ended_sessions        INTEGER NOT NULL DEFAULT 0,
    bounce_rate           REAL NOT NULL DEFAULT 0,
    avg_session_duration  REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (tenant_id, date, device_type)
)
"#;

/// Per-content daily performance rollup.
pub const CREATE_CONTENT_PERFORMANCE: &str = r#"
CREATE TABLE IF NOT EXISTS content_performance (
    tenant_id        INTEGER NOT NULL,
    content_type     TEXT NOT NULL,
    content_id       INTEGER NOT NULL,
    score_date       TEXT NOT NULL,
    impressions      INTEGER NOT NULL DEFAULT 0,
    clicks           INTEGER NOT NULL DEFAULT 0,
    social_shares    INTEGER NOT NULL DEFAULT 0,
    comment_count    INTEGER NOT NULL DEFAULT 0,
    conversion_count INTEGER NOT NULL DEFAULT 0,
    ctr              REAL NOT NULL DEFAULT 0,
    engagement_rate  REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (tenant_id, content_type, content_id, score_date)
)
"#;

/// Operator-authored funnel configurations (consumed, not produced,
/// by this engine).
pub const CREATE_FUNNEL_DEFINITIONS: &str = r#"
CREATE TABLE IF NOT EXISTS funnel_definitions (
    funnel_id       INTEGER PRIMARY KEY,
    tenant_id       INTEGER NOT NULL,
    name            TEXT NOT NULL,
    steps           TEXT NOT NULL,
    conversion_goal TEXT
)
"#;

pub const CREATE_FUNNEL_DEFINITIONS_IDX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_funnel_definitions_tenant
ON funnel_definitions (tenant_id)
"#;

/// Daily funnel entrance/completion counters.
///
/// Drop-offs and avg time-to-conversion are derived at read time,
/// never written, so `entrances >= completions` holds by construction.
pub const CREATE_FUNNEL_DAILY_STATS: &str = r#"
CREATE TABLE IF NOT EXISTS funnel_daily_stats (
    funnel_id                INTEGER NOT NULL,
    date                     TEXT NOT NULL,
    entrances                INTEGER NOT NULL DEFAULT 0,
    completions              INTEGER NOT NULL DEFAULT 0,
    total_conversion_seconds REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (funnel_id, date)
)
"#;

/// Per-step daily counters. One row per reached step keeps each
/// step advance a single atomic increment.
pub const CREATE_FUNNEL_STEP_DAILY: &str = r#"
CREATE TABLE IF NOT EXISTS funnel_step_daily (
    funnel_id  INTEGER NOT NULL,
    date       TEXT NOT NULL,
    step_index INTEGER NOT NULL,
    count      INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (funnel_id, date, step_index)
)
"#;

/// Keyword ranking history, one sample per (keyword, date, device,
/// location). `previous_position` is a convenience cache of the prior
/// sample for the same dimensions.
pub const CREATE_KEYWORD_RANKING_SAMPLES: &str = r#"
CREATE TABLE IF NOT EXISTS keyword_ranking_samples (
    keyword_id        INTEGER NOT NULL,
    date              TEXT NOT NULL,
    device_type       TEXT NOT NULL DEFAULT 'unknown',
    location          TEXT NOT NULL DEFAULT '',
    position          REAL NOT NULL,
    clicks            INTEGER NOT NULL DEFAULT 0,
    impressions       INTEGER NOT NULL DEFAULT 0,
    ctr               REAL NOT NULL DEFAULT 0,
    previous_position REAL,
    change            REAL,
    PRIMARY KEY (keyword_id, date, device_type, location)
)
"#;

/// All schema statements, in creation order.
pub fn all_statements() -> Vec<&'static str> {
    vec![
        CREATE_RAW_EVENTS,
        CREATE_RAW_EVENTS_IDX,
        CREATE_DAILY_METRICS,
        CREATE_CONTENT_PERFORMANCE,
        CREATE_FUNNEL_DEFINITIONS,
        CREATE_FUNNEL_DEFINITIONS_IDX,
        CREATE_FUNNEL_DAILY_STATS,
        CREATE_FUNNEL_STEP_DAILY,
        CREATE_KEYWORD_RANKING_SAMPLES,
    ]
}

/// Initialize the database schema. Idempotent.
pub async fn init_schema(store: &EventStore) -> Result<()> {
    for sql in all_statements() {
        sqlx::query(sql)
            .execute(store.pool())
            .await
            .map_err(map_sqlx)?;
    }
    Ok(())
}
