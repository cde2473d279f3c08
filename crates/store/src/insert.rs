//! Write path: raw-event appends and atomic rollup increments.
//!
//! Every aggregate write is a single `INSERT .. ON CONFLICT .. DO
//! UPDATE` keyed on the row's natural key, with derived ratios
//! recomputed inside the same statement. Concurrent increments to the
//! same row therefore commute and no read-modify-write window exists.

use chrono::NaiveDate;
use engine_core::derived;
use engine_core::{
    ContentDelta, ContentKey, DailyMetricKey, EngagementDelta, FunnelDefinition, KeywordSample,
    RawEvent, Result,
};
use sqlx::Row;

use crate::client::{map_sqlx, EventStore};

impl EventStore {
    /// Appends one raw event. Returns `false` when the event id was
    /// already recorded, in which case the caller must skip rollups.
    pub async fn insert_raw_event(&self, event: &RawEvent) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO raw_events
                (event_id, tenant_id, event_type, category, action, label,
                 numeric_value, session_id, path, device_type, browser,
                 referrer, timestamp, received_at, extra)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(event_id) DO NOTHING
            "#,
        )
        .bind(event.event_id.to_string())
        .bind(event.tenant_id)
        .bind(&event.event_type)
        .bind(&event.category)
        .bind(&event.action)
        .bind(&event.label)
        .bind(event.numeric_value)
        .bind(&event.session_id)
        .bind(&event.path)
        .bind(event.device_type.as_str())
        .bind(&event.browser)
        .bind(&event.referrer)
        .bind(event.timestamp)
        .bind(event.received_at)
        .bind(&event.extra)
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies an engagement delta to one daily-metric row.
    ///
    /// `bounce_rate` and `avg_session_duration` are recomputed from the
    /// post-increment counters inside the statement, so readers never
    /// observe a counter/ratio mismatch.
    pub async fn increment_daily_metric(
        &self,
        key: &DailyMetricKey,
        delta: &EngagementDelta,
    ) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO daily_metrics
                (tenant_id, date, device_type,
                 page_views, unique_visitors, sessions, new_users,
                 returning_users, content_interactions, bounce_sessions,
                 total_session_seconds, ended_sessions,
                 bounce_rate, avg_session_duration)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tenant_id, date, device_type) DO UPDATE SET
                page_views            = daily_metrics.page_views + excluded.page_views,
                unique_visitors       = daily_metrics.unique_visitors + excluded.unique_visitors,
                sessions              = daily_metrics.sessions + excluded.sessions,
                new_users             = daily_metrics.new_users + excluded.new_users,
                returning_users       = daily_metrics.returning_users + excluded.returning_users,
                content_interactions  = daily_metrics.content_interactions + excluded.content_interactions,
                bounce_sessions       = daily_metrics.bounce_sessions + excluded.bounce_sessions,
                total_session_seconds = daily_metrics.total_session_seconds + excluded.total_session_seconds,
                ended_sessions        = daily_metrics.ended_sessions + excluded.ended_sessions,
                bounce_rate = CASE
                    WHEN daily_metrics.ended_sessions + excluded.ended_sessions > 0
                    THEN MIN(1.0,
                        CAST(daily_metrics.bounce_sessions + excluded.bounce_sessions AS REAL)
                        / (daily_metrics.ended_sessions + excluded.ended_sessions))
                    ELSE 0.0 END,
                avg_session_duration = CASE
                    WHEN daily_metrics.ended_sessions + excluded.ended_sessions > 0
                    THEN (daily_metrics.total_session_seconds + excluded.total_session_seconds)
                        / (daily_metrics.ended_sessions + excluded.ended_sessions)
                    ELSE 0.0 END
            "#,
        )
        .bind(key.tenant_id)
        .bind(key.date)
        .bind(key.device_type.as_str())
        .bind(delta.page_views)
        .bind(delta.unique_visitors)
        .bind(delta.sessions)
        .bind(delta.new_users)
        .bind(delta.returning_users)
        .bind(delta.content_interactions)
        .bind(delta.bounce_sessions)
        .bind(delta.session_seconds)
        .bind(delta.ended_sessions)
        .bind(derived::bounce_rate(delta.bounce_sessions, delta.ended_sessions))
        .bind(derived::avg_session_duration(delta.session_seconds, delta.ended_sessions))
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    /// Applies a content delta to one content-performance row.
    pub async fn increment_content_performance(
        &self,
        key: &ContentKey,
        delta: &ContentDelta,
    ) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO content_performance
                (tenant_id, content_type, content_id, score_date,
                 impressions, clicks, social_shares, comment_count,
                 conversion_count, ctr, engagement_rate)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tenant_id, content_type, content_id, score_date) DO UPDATE SET
                impressions      = content_performance.impressions + excluded.impressions,
                clicks           = content_performance.clicks + excluded.clicks,
                social_shares    = content_performance.social_shares + excluded.social_shares,
                comment_count    = content_performance.comment_count + excluded.comment_count,
                conversion_count = content_performance.conversion_count + excluded.conversion_count,
                ctr = CASE
                    WHEN content_performance.impressions + excluded.impressions > 0
                    THEN MIN(1.0,
                        CAST(content_performance.clicks + excluded.clicks AS REAL)
                        / (content_performance.impressions + excluded.impressions))
                    ELSE 0.0 END,
                engagement_rate = CASE
                    WHEN content_performance.impressions + excluded.impressions > 0
                    THEN MIN(1.0, CAST(
                        content_performance.clicks + excluded.clicks
                        + content_performance.social_shares + excluded.social_shares
                        + content_performance.comment_count + excluded.comment_count AS REAL)
                        / (content_performance.impressions + excluded.impressions))
                    ELSE 0.0 END
            "#,
        )
        .bind(key.tenant_id)
        .bind(&key.content_type)
        .bind(key.content_id)
        .bind(key.score_date)
        .bind(delta.impressions)
        .bind(delta.clicks)
        .bind(delta.social_shares)
        .bind(delta.comment_count)
        .bind(delta.conversion_count)
        .bind(derived::ctr(delta.clicks, delta.impressions))
        .bind(derived::engagement_rate(
            delta.clicks,
            delta.social_shares,
            delta.comment_count,
            delta.impressions,
        ))
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    /// Records a session entering a funnel: one entrance plus one
    /// step-0 reach, committed together.
    pub async fn record_funnel_entrance(&self, funnel_id: i64, date: NaiveDate) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx)?;

        sqlx::query(
            r#"
            INSERT INTO funnel_daily_stats (funnel_id, date, entrances)
            VALUES (?, ?, 1)
            ON CONFLICT(funnel_id, date) DO UPDATE SET
                entrances = funnel_daily_stats.entrances + 1
            "#,
        )
        .bind(funnel_id)
        .bind(date)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        sqlx::query(
            r#"
            INSERT INTO funnel_step_daily (funnel_id, date, step_index, count)
            VALUES (?, ?, 0, 1)
            ON CONFLICT(funnel_id, date, step_index) DO UPDATE SET
                count = funnel_step_daily.count + 1
            "#,
        )
        .bind(funnel_id)
        .bind(date)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)
    }

    /// Records a session reaching an intermediate or terminal step.
    pub async fn record_funnel_step(
        &self,
        funnel_id: i64,
        date: NaiveDate,
        step_index: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO funnel_step_daily (funnel_id, date, step_index, count)
            VALUES (?, ?, ?, 1)
            ON CONFLICT(funnel_id, date, step_index) DO UPDATE SET
                count = funnel_step_daily.count + 1
            "#,
        )
        .bind(funnel_id)
        .bind(date)
        .bind(step_index)
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    /// Records a completed funnel traversal and its elapsed time.
    pub async fn record_funnel_completion(
        &self,
        funnel_id: i64,
        date: NaiveDate,
        conversion_seconds: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO funnel_daily_stats
                (funnel_id, date, completions, total_conversion_seconds)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(funnel_id, date) DO UPDATE SET
                completions = funnel_daily_stats.completions + 1,
                total_conversion_seconds =
                    funnel_daily_stats.total_conversion_seconds + excluded.total_conversion_seconds
            "#,
        )
        .bind(funnel_id)
        .bind(date)
        .bind(conversion_seconds.max(0.0))
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    /// Stores one keyword ranking observation.
    ///
    /// The latest prior sample for the same (keyword, device, location)
    /// is looked up inside the transaction and cached as
    /// `previous_position`; `change` is positive when the position
    /// improved (moved toward 1).
    pub async fn insert_keyword_sample(&self, sample: &KeywordSample) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx)?;

        let previous: Option<f64> = sqlx::query(
            r#"
            SELECT position FROM keyword_ranking_samples
            WHERE keyword_id = ? AND device_type = ? AND location = ? AND date < ?
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(sample.keyword_id)
        .bind(sample.device_type.as_str())
        .bind(&sample.location)
        .bind(sample.date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?
        .map(|row| row.get("position"));

        let change = previous.map(|prev| prev - sample.position);
        let ctr = derived::ctr(sample.clicks, sample.impressions);

        // A repeated sample for the same day overwrites rather than
        // accumulates; rankings are observations, not counters.
        sqlx::query(
            r#"
            INSERT INTO keyword_ranking_samples
                (keyword_id, date, device_type, location, position,
                 clicks, impressions, ctr, previous_position, change)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(keyword_id, date, device_type, location) DO UPDATE SET
                position          = excluded.position,
                clicks            = excluded.clicks,
                impressions       = excluded.impressions,
                ctr               = excluded.ctr,
                previous_position = excluded.previous_position,
                change            = excluded.change
            "#,
        )
        .bind(sample.keyword_id)
        .bind(sample.date)
        .bind(sample.device_type.as_str())
        .bind(&sample.location)
        .bind(sample.position)
        .bind(sample.clicks)
        .bind(sample.impressions)
        .bind(ctr)
        .bind(previous)
        .bind(change)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)
    }

    /// Creates or replaces a funnel definition.
    pub async fn upsert_funnel_definition(&self, def: &FunnelDefinition) -> Result<()> {
        let steps = serde_json::to_string(&def.steps)?;

        sqlx::query(
            r#"
            INSERT INTO funnel_definitions
                (funnel_id, tenant_id, name, steps, conversion_goal)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(funnel_id) DO UPDATE SET
                tenant_id       = excluded.tenant_id,
                name            = excluded.name,
                steps           = excluded.steps,
                conversion_goal = excluded.conversion_goal
            "#,
        )
        .bind(def.funnel_id)
        .bind(def.tenant_id)
        .bind(&def.name)
        .bind(steps)
        .bind(&def.conversion_goal)
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }
}
