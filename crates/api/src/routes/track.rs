//! Tracking endpoint handlers.
//!
//! `track_event` is the main envelope path: validate, persist the raw
//! fact, then aggregate. The three direct endpoints accept pre-shaped
//! deltas/samples for callers that aggregate client-side.

use axum::{body::Bytes, extract::State, Json};
use chrono::NaiveDate;
use engine_core::{
    limits::MAX_EVENT_SIZE_BYTES, ContentDelta, ContentKey, DailyMetricKey, DeviceType,
    EngagementDelta, Error, EventEnvelope, KeywordSample,
};
use serde::Deserialize;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, error, warn};

use crate::extractors::ClientIp;
use crate::response::{AckResponse, ApiError, TrackResponse};
use crate::state::AppState;

/// POST /analytics/track-event - Primary event ingestion endpoint.
///
/// The raw event is persisted before any aggregation runs; rollup
/// failures after that point are logged and deferred, never surfaced,
/// because the fact itself is already durable.
pub async fn track_event_handler(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    body: Bytes,
) -> Result<Json<TrackResponse>, ApiError> {
    let start = Instant::now();
    metrics().events_received.inc();

    if body.len() > MAX_EVENT_SIZE_BYTES {
        metrics().events_rejected.inc();
        return Err(ApiError::bad_request(format!(
            "Payload size {}KB exceeds {}KB limit",
            body.len() / 1024,
            MAX_EVENT_SIZE_BYTES / 1024
        )));
    }

    let envelope = EventEnvelope::parse(&body).map_err(|e| {
        metrics().events_rejected.inc();
        warn!(client_ip = ?client_ip, "Rejected event envelope: {e}");
        ApiError::from(e)
    })?;

    debug!(
        tenant_id = envelope.tenant_id,
        event_type = %envelope.event_type,
        "Received event"
    );

    let inserted = state.store.insert_raw_event(&envelope.to_raw()).await?;

    if inserted {
        metrics().raw_events_inserted.inc();
        // Registry updates are gated on first insert so a replayed
        // delivery cannot inflate the session's page-view count.
        state.sessions.observe(&envelope);
        if let Err(e) = state.aggregator.apply_event(&envelope).await {
            error!(
                tenant_id = envelope.tenant_id,
                event_id = %envelope.event_id,
                "Aggregation failed for durable event: {e}"
            );
        }
    } else {
        metrics().duplicate_events.inc();
        debug!(event_id = %envelope.event_id, "Duplicate delivery acknowledged");
    }

    metrics()
        .ingest_latency_ms
        .observe(start.elapsed().as_millis() as u64);

    let response = if inserted {
        TrackResponse::accepted(envelope.event_id)
    } else {
        TrackResponse::duplicate(envelope.event_id)
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementWire {
    tenant_id: i64,
    date: NaiveDate,
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    page_views: i64,
    #[serde(default)]
    unique_visitors: i64,
    #[serde(default)]
    sessions: i64,
    #[serde(default)]
    new_users: i64,
    #[serde(default)]
    returning_users: i64,
    #[serde(default)]
    content_interactions: i64,
    #[serde(default)]
    bounce_sessions: i64,
    #[serde(default)]
    session_seconds: f64,
    #[serde(default)]
    ended_sessions: i64,
}

/// POST /analytics/track-user-engagement - Direct daily-metric delta.
pub async fn track_engagement_handler(
    State(state): State<AppState>,
    Json(wire): Json<EngagementWire>,
) -> Result<Json<AckResponse>, ApiError> {
    if wire.tenant_id <= 0 {
        return Err(Error::invalid_tenant(format!(
            "tenantId must be positive, got {}",
            wire.tenant_id
        ))
        .into());
    }

    let key = DailyMetricKey {
        tenant_id: wire.tenant_id,
        date: wire.date,
        device_type: wire
            .device_type
            .as_deref()
            .map(DeviceType::parse)
            .unwrap_or_default(),
    };
    let delta = EngagementDelta {
        page_views: wire.page_views,
        unique_visitors: wire.unique_visitors,
        sessions: wire.sessions,
        new_users: wire.new_users,
        returning_users: wire.returning_users,
        content_interactions: wire.content_interactions,
        bounce_sessions: wire.bounce_sessions,
        session_seconds: wire.session_seconds,
        ended_sessions: wire.ended_sessions,
    };
    if delta.has_negative() {
        return Err(Error::validation("counter deltas must be non-negative").into());
    }

    state.store.increment_daily_metric(&key, &delta).await?;
    metrics().rollup_increments.inc();
    Ok(Json(AckResponse::ok()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentWire {
    tenant_id: i64,
    content_type: String,
    content_id: i64,
    score_date: NaiveDate,
    #[serde(default)]
    impressions: i64,
    #[serde(default)]
    clicks: i64,
    #[serde(default)]
    social_shares: i64,
    #[serde(default)]
    comment_count: i64,
    #[serde(default)]
    conversion_count: i64,
}

/// POST /analytics/track-content-performance - Direct content delta.
pub async fn track_content_handler(
    State(state): State<AppState>,
    Json(wire): Json<ContentWire>,
) -> Result<Json<AckResponse>, ApiError> {
    if wire.tenant_id <= 0 {
        return Err(Error::invalid_tenant(format!(
            "tenantId must be positive, got {}",
            wire.tenant_id
        ))
        .into());
    }
    if wire.content_type.trim().is_empty() {
        return Err(Error::missing_field("contentType").into());
    }

    let key = ContentKey {
        tenant_id: wire.tenant_id,
        content_type: wire.content_type,
        content_id: wire.content_id,
        score_date: wire.score_date,
    };
    let delta = ContentDelta {
        impressions: wire.impressions,
        clicks: wire.clicks,
        social_shares: wire.social_shares,
        comment_count: wire.comment_count,
        conversion_count: wire.conversion_count,
    };
    if delta.has_negative() {
        return Err(Error::validation("counter deltas must be non-negative").into());
    }

    state
        .store
        .increment_content_performance(&key, &delta)
        .await?;
    metrics().rollup_increments.inc();
    Ok(Json(AckResponse::ok()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordWire {
    keyword_id: i64,
    date: NaiveDate,
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    location: String,
    position: f64,
    #[serde(default)]
    clicks: i64,
    #[serde(default)]
    impressions: i64,
}

/// POST /analytics/track-keyword-ranking - Keyword ranking sample.
pub async fn track_keyword_handler(
    State(state): State<AppState>,
    Json(wire): Json<KeywordWire>,
) -> Result<Json<AckResponse>, ApiError> {
    if wire.keyword_id <= 0 {
        return Err(Error::validation(format!(
            "keywordId must be positive, got {}",
            wire.keyword_id
        ))
        .into());
    }
    if !wire.position.is_finite() || wire.position <= 0.0 {
        return Err(Error::validation("position must be a positive number").into());
    }
    if wire.clicks < 0 || wire.impressions < 0 {
        return Err(Error::validation("clicks and impressions must be non-negative").into());
    }

    let sample = KeywordSample {
        keyword_id: wire.keyword_id,
        date: wire.date,
        device_type: wire
            .device_type
            .as_deref()
            .map(DeviceType::parse)
            .unwrap_or_default(),
        location: wire.location,
        position: wire.position,
        clicks: wire.clicks,
        impressions: wire.impressions,
    };

    state.store.insert_keyword_sample(&sample).await?;
    Ok(Json(AckResponse::ok()))
}
