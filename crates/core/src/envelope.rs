//! Event envelope types and ingestion validation.
//!
//! The capture client sends camelCase JSON envelopes. This module
//! parses them, enforces the required-field contract (tenant, event
//! type, timestamp), and produces the immutable `RawEvent` record the
//! store appends.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::device::DeviceType;
use crate::error::{Error, Result};
use crate::limits::{MAX_EXTRA_BYTES, MAX_FUTURE_SKEW_SECS};

/// Event kinds the aggregator knows how to roll up.
///
/// Unknown types are retained as raw facts (and still run through
/// funnel matching) but produce no counter increments of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageView,
    Click,
    ContentView,
    ContentClick,
    SocialShare,
    FormSubmission,
    Conversion,
    Search,
    SessionEnd,
    Heartbeat,
    Custom,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageView => "page_view",
            Self::Click => "click",
            Self::ContentView => "content_view",
            Self::ContentClick => "content_click",
            Self::SocialShare => "social_share",
            Self::FormSubmission => "form_submission",
            Self::Conversion => "conversion",
            Self::Search => "search",
            Self::SessionEnd => "session_end",
            Self::Heartbeat => "heartbeat",
            Self::Custom => "custom",
        }
    }

    /// Maps a wire event type; anything unrecognized is `Custom`.
    pub fn parse(value: &str) -> Self {
        match value {
            "page_view" => Self::PageView,
            "click" => Self::Click,
            "content_view" => Self::ContentView,
            "content_click" => Self::ContentClick,
            "social_share" => Self::SocialShare,
            "form_submission" => Self::FormSubmission,
            "conversion" => Self::Conversion,
            "search" => Self::Search,
            "session_end" => Self::SessionEnd,
            "heartbeat" => Self::Heartbeat,
            _ => Self::Custom,
        }
    }
}

/// Envelope as received on the wire (camelCase, loosely typed).
///
/// Required-field enforcement happens in [`EventEnvelope::parse`], not
/// in serde, so a missing tenant produces our validation error rather
/// than a deserializer rejection.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct EnvelopeWire {
    event_id: Option<String>,
    tenant_id: Option<i64>,
    event_type: Option<String>,
    timestamp: Option<String>,
    #[validate(length(max = 128))]
    session_id: Option<String>,
    #[validate(length(max = 500))]
    category: Option<String>,
    #[validate(length(max = 500))]
    action: Option<String>,
    #[validate(length(max = 500))]
    label: Option<String>,
    value: Option<f64>,
    #[validate(length(max = 2000))]
    path: Option<String>,
    device_type: Option<String>,
    #[validate(length(max = 128))]
    browser: Option<String>,
    #[validate(length(max = 2048))]
    referrer: Option<String>,
    #[serde(default)]
    extra: HashMap<String, Value>,
}

/// A validated event envelope, ready for persistence and rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Client-generated idempotency key; generated server-side when the
    /// client omits it (older clients), in which case replays are not
    /// deduplicated.
    pub event_id: Uuid,
    pub tenant_id: i64,
    pub kind: EventKind,
    /// Original wire event type; preserved for `Custom` kinds.
    pub event_type: String,
    pub category: Option<String>,
    pub action: Option<String>,
    pub label: Option<String>,
    pub numeric_value: Option<f64>,
    pub session_id: Option<String>,
    pub path: Option<String>,
    pub device_type: DeviceType,
    pub browser: Option<String>,
    pub referrer: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub extra: HashMap<String, Value>,
}

impl EventEnvelope {
    /// Parses and validates a raw request body.
    ///
    /// Validation failures are never persisted or aggregated; the
    /// caller maps them to a 4xx response.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let wire: EnvelopeWire = serde_json::from_slice(body)
            .map_err(|e| Error::validation(format!("malformed envelope: {e}")))?;

        wire.validate()
            .map_err(|e| Error::validation(e.to_string()))?;

        let tenant_id = wire
            .tenant_id
            .ok_or_else(|| Error::missing_field("tenantId"))?;
        if tenant_id <= 0 {
            return Err(Error::invalid_tenant(format!(
                "tenantId must be positive, got {tenant_id}"
            )));
        }

        let event_type = wire
            .event_type
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::missing_field("eventType"))?;

        let raw_ts = wire
            .timestamp
            .ok_or_else(|| Error::missing_field("timestamp"))?;
        let timestamp = DateTime::parse_from_rfc3339(&raw_ts)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| Error::validation(format!("malformed timestamp {raw_ts:?}: {e}")))?;

        let now = Utc::now();
        if (timestamp - now).num_seconds() > MAX_FUTURE_SKEW_SECS {
            return Err(Error::validation(format!(
                "timestamp {timestamp} is too far in the future"
            )));
        }

        let extra_size = serde_json::to_vec(&wire.extra).map(|v| v.len()).unwrap_or(0);
        if extra_size > MAX_EXTRA_BYTES {
            return Err(Error::validation(format!(
                "extra map {}KB exceeds {}KB limit",
                extra_size / 1024,
                MAX_EXTRA_BYTES / 1024
            )));
        }

        let event_id = match wire.event_id {
            Some(raw) => Uuid::parse_str(&raw)
                .map_err(|e| Error::validation(format!("malformed eventId {raw:?}: {e}")))?,
            None => Uuid::new_v4(),
        };

        Ok(Self {
            event_id,
            tenant_id,
            kind: EventKind::parse(&event_type),
            event_type,
            category: wire.category,
            action: wire.action,
            label: wire.label,
            numeric_value: wire.value,
            session_id: wire.session_id,
            path: wire.path,
            device_type: wire.device_type.as_deref().map(DeviceType::parse).unwrap_or_default(),
            browser: wire.browser,
            referrer: wire.referrer,
            timestamp,
            received_at: now,
            extra: wire.extra,
        })
    }

    /// The daily bucket this event falls into (UTC).
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Page views reported by a `session_end` envelope, if present.
    pub fn page_view_count(&self) -> Option<i64> {
        self.extra.get("pageViewCount").and_then(Value::as_i64)
    }

    /// Builds the immutable raw event record for persistence.
    pub fn to_raw(&self) -> RawEvent {
        RawEvent {
            event_id: self.event_id,
            tenant_id: self.tenant_id,
            event_type: self.event_type.clone(),
            category: self.category.clone(),
            action: self.action.clone(),
            label: self.label.clone(),
            numeric_value: self.numeric_value,
            session_id: self.session_id.clone(),
            path: self.path.clone(),
            device_type: self.device_type,
            browser: self.browser.clone(),
            referrer: self.referrer.clone(),
            timestamp: self.timestamp,
            received_at: self.received_at,
            extra: serde_json::to_string(&self.extra).unwrap_or_else(|_| "{}".to_string()),
        }
    }
}

/// Immutable record of one emitted client event.
///
/// Created once per delivery, never mutated, retained for audit and
/// replay. Aggregates can always be rebuilt from these rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_id: Uuid,
    pub tenant_id: i64,
    pub event_type: String,
    pub category: Option<String>,
    pub action: Option<String>,
    pub label: Option<String>,
    pub numeric_value: Option<f64>,
    pub session_id: Option<String>,
    pub path: Option<String>,
    pub device_type: DeviceType,
    pub browser: Option<String>,
    pub referrer: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    /// JSON-encoded key→value map.
    pub extra: String,
}
