//! Read path: report queries over the rollup tables.
//!
//! Reads never mutate aggregates. Cross-row totals (tenant/day across
//! devices) are summed here and their ratios recomputed from the summed
//! counters, so a report derived from several rows stays consistent
//! with the per-row invariants.

use chrono::NaiveDate;
use engine_core::{derived, DailyMetricKey, FunnelDefinition, Result};
use serde::Serialize;
use sqlx::{FromRow, Row};

use crate::client::{map_sqlx, EventStore};

/// One `daily_metrics` row as stored.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailyMetricRow {
    pub tenant_id: i64,
    pub date: NaiveDate,
    pub device_type: String,
    pub page_views: i64,
    pub unique_visitors: i64,
    pub sessions: i64,
    pub new_users: i64,
    pub returning_users: i64,
    pub content_interactions: i64,
    pub bounce_sessions: i64,
    pub total_session_seconds: f64,
    pub ended_sessions: i64,
    pub bounce_rate: f64,
    pub avg_session_duration: f64,
}

/// Tenant-level totals over a date range, summed across devices.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngagementSummary {
    pub page_views: i64,
    pub unique_visitors: i64,
    pub sessions: i64,
    pub new_users: i64,
    pub returning_users: i64,
    pub content_interactions: i64,
    pub bounce_sessions: i64,
    pub ended_sessions: i64,
    pub bounce_rate: f64,
    pub avg_session_duration: f64,
}

/// One `content_performance` row as stored.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContentPerformanceRow {
    pub tenant_id: i64,
    pub content_type: String,
    pub content_id: i64,
    pub score_date: NaiveDate,
    pub impressions: i64,
    pub clicks: i64,
    pub social_shares: i64,
    pub comment_count: i64,
    pub conversion_count: i64,
    pub ctr: f64,
    pub engagement_rate: f64,
}

/// Ranking metric for content leaderboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMetric {
    Impressions,
    Clicks,
    SocialShares,
    Conversions,
    EngagementRate,
}

impl ContentMetric {
    fn column(&self) -> &'static str {
        match self {
            Self::Impressions => "impressions",
            Self::Clicks => "clicks",
            Self::SocialShares => "social_shares",
            Self::Conversions => "conversion_count",
            Self::EngagementRate => "engagement_rate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "impressions" => Some(Self::Impressions),
            "clicks" => Some(Self::Clicks),
            "social_shares" => Some(Self::SocialShares),
            "conversions" => Some(Self::Conversions),
            "engagement_rate" => Some(Self::EngagementRate),
            _ => None,
        }
    }
}

/// One day of funnel performance with derived fields filled in.
#[derive(Debug, Clone, Serialize)]
pub struct FunnelDayReport {
    pub date: NaiveDate,
    pub entrances: i64,
    pub completions: i64,
    /// Sessions reaching each step, index-aligned with the definition.
    pub step_counts: Vec<i64>,
    /// `step_counts[i] - step_counts[i + 1]` for each non-terminal step.
    pub drop_offs: Vec<i64>,
    pub conversion_rate: f64,
    pub avg_time_to_conversion_seconds: f64,
}

/// One `keyword_ranking_samples` row as stored.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct KeywordSampleRow {
    pub keyword_id: i64,
    pub date: NaiveDate,
    pub device_type: String,
    pub location: String,
    pub position: f64,
    pub clicks: i64,
    pub impressions: i64,
    pub ctr: f64,
    pub previous_position: Option<f64>,
    pub change: Option<f64>,
}

impl EventStore {
    /// Fetches one daily-metric row by its natural key.
    pub async fn get_daily_metric(&self, key: &DailyMetricKey) -> Result<Option<DailyMetricRow>> {
        sqlx::query_as(
            r#"
            SELECT * FROM daily_metrics
            WHERE tenant_id = ? AND date = ? AND device_type = ?
            "#,
        )
        .bind(key.tenant_id)
        .bind(key.date)
        .bind(key.device_type.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx)
    }

    /// Per-day engagement rows for a tenant, summed across devices,
    /// ordered by date. Ratios are recomputed from the summed counters.
    pub async fn engagement_series(
        &self,
        tenant_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyMetricRow>> {
        let rows = sqlx::query(
            r#"
            SELECT date,
                   SUM(page_views) AS page_views,
                   SUM(unique_visitors) AS unique_visitors,
                   SUM(sessions) AS sessions,
                   SUM(new_users) AS new_users,
                   SUM(returning_users) AS returning_users,
                   SUM(content_interactions) AS content_interactions,
                   SUM(bounce_sessions) AS bounce_sessions,
                   SUM(total_session_seconds) AS total_session_seconds,
                   SUM(ended_sessions) AS ended_sessions
            FROM daily_metrics
            WHERE tenant_id = ? AND date >= ? AND date <= ?
            GROUP BY date
            ORDER BY date
            "#,
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let bounce_sessions: i64 = row.get("bounce_sessions");
                let ended_sessions: i64 = row.get("ended_sessions");
                let total_session_seconds: f64 = row.get("total_session_seconds");
                DailyMetricRow {
                    tenant_id,
                    date: row.get("date"),
                    device_type: "all".to_string(),
                    page_views: row.get("page_views"),
                    unique_visitors: row.get("unique_visitors"),
                    sessions: row.get("sessions"),
                    new_users: row.get("new_users"),
                    returning_users: row.get("returning_users"),
                    content_interactions: row.get("content_interactions"),
                    bounce_sessions,
                    total_session_seconds,
                    ended_sessions,
                    bounce_rate: derived::bounce_rate(bounce_sessions, ended_sessions),
                    avg_session_duration: derived::avg_session_duration(
                        total_session_seconds,
                        ended_sessions,
                    ),
                }
            })
            .collect())
    }

    /// Range totals for a tenant across all devices and days.
    pub async fn engagement_summary(
        &self,
        tenant_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<EngagementSummary> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(page_views), 0) AS page_views,
                   COALESCE(SUM(unique_visitors), 0) AS unique_visitors,
                   COALESCE(SUM(sessions), 0) AS sessions,
                   COALESCE(SUM(new_users), 0) AS new_users,
                   COALESCE(SUM(returning_users), 0) AS returning_users,
                   COALESCE(SUM(content_interactions), 0) AS content_interactions,
                   COALESCE(SUM(bounce_sessions), 0) AS bounce_sessions,
                   COALESCE(SUM(total_session_seconds), 0.0) AS total_session_seconds,
                   COALESCE(SUM(ended_sessions), 0) AS ended_sessions
            FROM daily_metrics
            WHERE tenant_id = ? AND date >= ? AND date <= ?
            "#,
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx)?;

        let bounce_sessions: i64 = row.get("bounce_sessions");
        let ended_sessions: i64 = row.get("ended_sessions");
        let total_session_seconds: f64 = row.get("total_session_seconds");

        Ok(EngagementSummary {
            page_views: row.get("page_views"),
            unique_visitors: row.get("unique_visitors"),
            sessions: row.get("sessions"),
            new_users: row.get("new_users"),
            returning_users: row.get("returning_users"),
            content_interactions: row.get("content_interactions"),
            bounce_sessions,
            ended_sessions,
            bounce_rate: derived::bounce_rate(bounce_sessions, ended_sessions),
            avg_session_duration: derived::avg_session_duration(
                total_session_seconds,
                ended_sessions,
            ),
        })
    }

    /// Per-device rows for one tenant/day.
    pub async fn device_breakdown(
        &self,
        tenant_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<DailyMetricRow>> {
        sqlx::query_as(
            r#"
            SELECT * FROM daily_metrics
            WHERE tenant_id = ? AND date = ?
            ORDER BY device_type
            "#,
        )
        .bind(tenant_id)
        .bind(date)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)
    }

    /// Fetches one content-performance row by its natural key.
    pub async fn get_content_performance(
        &self,
        tenant_id: i64,
        content_type: &str,
        content_id: i64,
        score_date: NaiveDate,
    ) -> Result<Option<ContentPerformanceRow>> {
        sqlx::query_as(
            r#"
            SELECT * FROM content_performance
            WHERE tenant_id = ? AND content_type = ? AND content_id = ? AND score_date = ?
            "#,
        )
        .bind(tenant_id)
        .bind(content_type)
        .bind(content_id)
        .bind(score_date)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx)
    }

    /// Top content rows for a tenant/date range ordered by the chosen
    /// metric. The column name comes from a closed enum, never caller
    /// input.
    pub async fn top_content(
        &self,
        tenant_id: i64,
        from: NaiveDate,
        to: NaiveDate,
        metric: ContentMetric,
        limit: i64,
    ) -> Result<Vec<ContentPerformanceRow>> {
        let sql = format!(
            r#"
            SELECT * FROM content_performance
            WHERE tenant_id = ? AND score_date >= ? AND score_date <= ?
            ORDER BY {} DESC
            LIMIT ?
            "#,
            metric.column()
        );

        sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(from)
            .bind(to)
            .bind(limit.clamp(1, 100))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx)
    }

    /// Fetches one funnel definition.
    pub async fn get_funnel_definition(&self, funnel_id: i64) -> Result<Option<FunnelDefinition>> {
        let row = sqlx::query(
            r#"
            SELECT funnel_id, tenant_id, name, steps, conversion_goal
            FROM funnel_definitions
            WHERE funnel_id = ?
            "#,
        )
        .bind(funnel_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx)?;

        row.map(parse_funnel_row).transpose()
    }

    /// All funnel definitions for a tenant.
    pub async fn list_funnel_definitions(&self, tenant_id: i64) -> Result<Vec<FunnelDefinition>> {
        let rows = sqlx::query(
            r#"
            SELECT funnel_id, tenant_id, name, steps, conversion_goal
            FROM funnel_definitions
            WHERE tenant_id = ?
            ORDER BY funnel_id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;

        rows.into_iter().map(parse_funnel_row).collect()
    }

    /// Per-day funnel report over a date range. Days with no activity
    /// are omitted; step counts are zero-filled to the definition's
    /// length and drop-offs derived from adjacent steps.
    pub async fn funnel_series(
        &self,
        def: &FunnelDefinition,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<FunnelDayReport>> {
        let days = sqlx::query(
            r#"
            SELECT date, entrances, completions, total_conversion_seconds
            FROM funnel_daily_stats
            WHERE funnel_id = ? AND date >= ? AND date <= ?
            ORDER BY date
            "#,
        )
        .bind(def.funnel_id)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;

        let mut reports = Vec::with_capacity(days.len());
        for day in days {
            let date: NaiveDate = day.get("date");
            let entrances: i64 = day.get("entrances");
            let completions: i64 = day.get("completions");
            let total_conversion_seconds: f64 = day.get("total_conversion_seconds");

            let mut step_counts = vec![0i64; def.steps.len()];
            let steps = sqlx::query(
                r#"
                SELECT step_index, count FROM funnel_step_daily
                WHERE funnel_id = ? AND date = ?
                "#,
            )
            .bind(def.funnel_id)
            .bind(date)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx)?;

            for step in steps {
                let index: i64 = step.get("step_index");
                if let Some(slot) = step_counts.get_mut(index as usize) {
                    *slot = step.get("count");
                }
            }

            let drop_offs = step_counts
                .windows(2)
                .map(|pair| (pair[0] - pair[1]).max(0))
                .collect();

            reports.push(FunnelDayReport {
                date,
                entrances,
                completions,
                step_counts,
                drop_offs,
                conversion_rate: derived::safe_ratio(completions, entrances),
                avg_time_to_conversion_seconds: derived::safe_average(
                    total_conversion_seconds,
                    completions,
                ),
            });
        }

        Ok(reports)
    }

    /// Fetches the sample history for one keyword dimension, newest
    /// first.
    pub async fn keyword_history(
        &self,
        keyword_id: i64,
        device_type: &str,
        location: &str,
        limit: i64,
    ) -> Result<Vec<KeywordSampleRow>> {
        sqlx::query_as(
            r#"
            SELECT * FROM keyword_ranking_samples
            WHERE keyword_id = ? AND device_type = ? AND location = ?
            ORDER BY date DESC
            LIMIT ?
            "#,
        )
        .bind(keyword_id)
        .bind(device_type)
        .bind(location)
        .bind(limit.clamp(1, 365))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)
    }

    /// Total raw events recorded for a tenant.
    pub async fn count_raw_events(&self, tenant_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM raw_events WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx)?;
        Ok(row.get("n"))
    }

    /// Deletes raw events older than the cutoff. Returns rows removed.
    pub async fn purge_raw_events_before(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM raw_events WHERE timestamp < ?")
            .bind(cutoff)
            .execute(self.pool())
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    /// Deletes keyword samples older than the cutoff date.
    pub async fn purge_keyword_samples_before(&self, cutoff: NaiveDate) -> Result<u64> {
        let result = sqlx::query("DELETE FROM keyword_ranking_samples WHERE date < ?")
            .bind(cutoff)
            .execute(self.pool())
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }
}

fn parse_funnel_row(row: sqlx::sqlite::SqliteRow) -> Result<FunnelDefinition> {
    let steps: String = row.get("steps");
    Ok(FunnelDefinition {
        funnel_id: row.get("funnel_id"),
        tenant_id: row.get("tenant_id"),
        name: row.get("name"),
        steps: serde_json::from_str(&steps)?,
        conversion_goal: row.get("conversion_goal"),
    })
}
