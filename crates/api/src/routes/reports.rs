//! Reporting read endpoints.
//!
//! Reads never mutate aggregates; cross-device totals are summed by the
//! store with ratios recomputed from the summed counters.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use engine_core::Error;
use event_store::{ContentMetric, ContentPerformanceRow, DailyMetricRow, EngagementSummary, FunnelDayReport};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use telemetry::metrics;

use crate::response::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    pub tenant_id: i64,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

fn check_range(tenant_id: i64, from: NaiveDate, to: NaiveDate) -> Result<(), ApiError> {
    if tenant_id <= 0 {
        return Err(Error::invalid_tenant(format!("tenantId must be positive, got {tenant_id}")).into());
    }
    if from > to {
        return Err(Error::validation(format!("from {from} is after to {to}")).into());
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct EngagementReport {
    pub summary: EngagementSummary,
    pub days: Vec<DailyMetricRow>,
}

/// GET /reports/engagement?tenantId&from&to
pub async fn engagement_report_handler(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<EngagementReport>, ApiError> {
    let start = Instant::now();
    check_range(query.tenant_id, query.from, query.to)?;

    let summary = state
        .store
        .engagement_summary(query.tenant_id, query.from, query.to)
        .await?;
    let days = state
        .store
        .engagement_series(query.tenant_id, query.from, query.to)
        .await?;

    metrics()
        .report_latency_ms
        .observe(start.elapsed().as_millis() as u64);
    Ok(Json(EngagementReport { summary, days }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuery {
    pub tenant_id: i64,
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_metric() -> String {
    "impressions".to_string()
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Serialize)]
pub struct ContentReport {
    pub metric: String,
    pub rows: Vec<ContentPerformanceRow>,
}

/// GET /reports/content?tenantId&from&to&metric&limit
pub async fn content_report_handler(
    State(state): State<AppState>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<ContentReport>, ApiError> {
    let start = Instant::now();
    check_range(query.tenant_id, query.from, query.to)?;

    let metric = ContentMetric::parse(&query.metric)
        .ok_or_else(|| Error::validation(format!("unknown content metric {:?}", query.metric)))?;

    let rows = state
        .store
        .top_content(query.tenant_id, query.from, query.to, metric, query.limit)
        .await?;

    metrics()
        .report_latency_ms
        .observe(start.elapsed().as_millis() as u64);
    Ok(Json(ContentReport {
        metric: query.metric,
        rows,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct FunnelReport {
    pub funnel_id: i64,
    pub name: String,
    pub steps: Vec<String>,
    pub days: Vec<FunnelDayReport>,
}

/// GET /reports/funnel/:funnel_id?from&to
pub async fn funnel_report_handler(
    State(state): State<AppState>,
    Path(funnel_id): Path<i64>,
    Query(query): Query<FunnelQuery>,
) -> Result<Json<FunnelReport>, ApiError> {
    let start = Instant::now();
    if query.from > query.to {
        return Err(Error::validation(format!(
            "from {} is after to {}",
            query.from, query.to
        ))
        .into());
    }

    let def = state
        .store
        .get_funnel_definition(funnel_id)
        .await?
        .ok_or_else(|| Error::UnknownFunnel(funnel_id.to_string()))?;

    let days = state.store.funnel_series(&def, query.from, query.to).await?;

    metrics()
        .report_latency_ms
        .observe(start.elapsed().as_millis() as u64);
    Ok(Json(FunnelReport {
        funnel_id: def.funnel_id,
        name: def.name.clone(),
        steps: def.steps.iter().map(|s| s.name.clone()).collect(),
        days,
    }))
}
