//! Natural keys and additive deltas for the aggregate entities.
//!
//! Every rollup write is expressed as a (key, delta) pair. The store
//! turns each pair into a single atomic upsert-with-increment, so
//! concurrent writers to the same key commute regardless of arrival
//! order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::device::DeviceType;

/// Natural key of one `daily_metrics` row.
///
/// Canonical granularity is `(tenant, date, device)`; tenant/date
/// totals are a read-side rollup summed across devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DailyMetricKey {
    pub tenant_id: i64,
    pub date: NaiveDate,
    pub device_type: DeviceType,
}

/// Additive counters applied to one `daily_metrics` row.
///
/// `bounce_rate` and `avg_session_duration` are not part of the delta;
/// they are derived from these counters inside the upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementDelta {
    pub page_views: i64,
    pub unique_visitors: i64,
    pub sessions: i64,
    pub new_users: i64,
    pub returning_users: i64,
    pub content_interactions: i64,
    /// Sessions that ended with exactly one page view.
    pub bounce_sessions: i64,
    /// Total duration contributed by sessions ending in this delta.
    pub session_seconds: f64,
    /// Sessions whose end (explicit or swept) is recorded by this delta.
    /// Denominator for both derived fields.
    pub ended_sessions: i64,
}

impl EngagementDelta {
    pub fn page_view() -> Self {
        Self {
            page_views: 1,
            ..Self::default()
        }
    }

    /// The contribution of one finished session.
    pub fn session_end(duration_seconds: f64, page_view_count: i64) -> Self {
        Self {
            sessions: 1,
            ended_sessions: 1,
            session_seconds: duration_seconds.max(0.0),
            bounce_sessions: i64::from(page_view_count == 1),
            ..Self::default()
        }
    }

    pub fn content_interaction() -> Self {
        Self {
            content_interactions: 1,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when any field would move a counter backwards. Counters
    /// only grow within a day, so such a delta must be rejected at the
    /// boundary before it reaches the store.
    pub fn has_negative(&self) -> bool {
        self.page_views < 0
            || self.unique_visitors < 0
            || self.sessions < 0
            || self.new_users < 0
            || self.returning_users < 0
            || self.content_interactions < 0
            || self.bounce_sessions < 0
            || self.ended_sessions < 0
            || !(self.session_seconds >= 0.0)
    }
}

/// Natural key of one `content_performance` row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentKey {
    pub tenant_id: i64,
    pub content_type: String,
    pub content_id: i64,
    pub score_date: NaiveDate,
}

/// Additive counters applied to one `content_performance` row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDelta {
    pub impressions: i64,
    pub clicks: i64,
    pub social_shares: i64,
    pub comment_count: i64,
    pub conversion_count: i64,
}

impl ContentDelta {
    pub fn impression() -> Self {
        Self {
            impressions: 1,
            ..Self::default()
        }
    }

    pub fn click() -> Self {
        Self {
            clicks: 1,
            ..Self::default()
        }
    }

    pub fn share() -> Self {
        Self {
            social_shares: 1,
            ..Self::default()
        }
    }

    pub fn conversion() -> Self {
        Self {
            conversion_count: 1,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when any field would move a counter backwards.
    pub fn has_negative(&self) -> bool {
        self.impressions < 0
            || self.clicks < 0
            || self.social_shares < 0
            || self.comment_count < 0
            || self.conversion_count < 0
    }
}

/// One keyword ranking observation.
///
/// `previous_position` and `change` are not carried here; the store
/// derives them from the latest prior sample for the same
/// (keyword, device, location).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSample {
    pub keyword_id: i64,
    pub date: NaiveDate,
    pub device_type: DeviceType,
    pub location: String,
    pub position: f64,
    pub clicks: i64,
    pub impressions: i64,
}
