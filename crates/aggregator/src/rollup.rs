//! The rollup aggregator.
//!
//! Consumes validated envelopes one at a time and folds each into the
//! affected aggregate rows. All writes go through the store's atomic
//! upserts; transient lock conflicts are retried with a bounded budget
//! and surfaced as failures only once the budget is spent.

use std::future::Future;
use std::time::{Duration, Instant};

use engine_core::{
    ContentDelta, ContentKey, DailyMetricKey, EngagementDelta, EventEnvelope, EventKind, Result,
};
use event_store::EventStore;
use serde_json::Value;
use telemetry::metrics;
use tracing::warn;

use crate::funnel::FunnelTracker;
use crate::outbox::{OutboxConfig, PendingRollup, RollupOutbox};

use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RollupConfig {
    /// Attempts per aggregate write before giving up.
    pub max_attempts: u32,
    /// Base backoff between attempts; grows linearly per attempt.
    pub retry_backoff: Duration,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(10),
        }
    }
}

pub struct RollupAggregator {
    store: EventStore,
    funnels: FunnelTracker,
    outbox: Arc<RollupOutbox>,
    config: RollupConfig,
}

impl RollupAggregator {
    pub fn new(store: EventStore) -> Self {
        Self::with_config(store, RollupConfig::default())
    }

    pub fn with_config(store: EventStore, config: RollupConfig) -> Self {
        let funnels = FunnelTracker::new(store.clone());
        Self {
            store,
            funnels,
            outbox: Arc::new(RollupOutbox::new(OutboxConfig::default())),
            config,
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// The deferred-delta queue, shared with the flush worker.
    pub fn outbox(&self) -> Arc<RollupOutbox> {
        self.outbox.clone()
    }

    /// Folds one freshly persisted event into every aggregate it
    /// affects.
    ///
    /// Must only be called for events whose raw insert actually landed;
    /// replays are filtered out before this point, which is what makes
    /// the increments idempotent per event id.
    pub async fn apply_event(&self, envelope: &EventEnvelope) -> Result<()> {
        let started = Instant::now();

        let engagement = engagement_delta(envelope);
        if !engagement.is_empty() {
            let key = DailyMetricKey {
                tenant_id: envelope.tenant_id,
                date: envelope.date(),
                device_type: envelope.device_type,
            };
            match self
                .retry(|| self.store.increment_daily_metric(&key, &engagement))
                .await
            {
                Ok(()) => metrics().rollup_increments.inc(),
                // Contention outlived the budget: defer, never drop.
                Err(err) if err.is_transient() => {
                    self.outbox.push(PendingRollup::Engagement {
                        key,
                        delta: engagement,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(key) = content_target(envelope) {
            let delta = content_delta(envelope);
            if !delta.is_empty() {
                match self
                    .retry(|| self.store.increment_content_performance(&key, &delta))
                    .await
                {
                    Ok(()) => metrics().rollup_increments.inc(),
                    Err(err) if err.is_transient() => {
                        self.outbox.push(PendingRollup::Content { key, delta });
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        self.funnels.observe(envelope).await?;

        metrics()
            .rollup_latency_ms
            .observe(started.elapsed().as_millis() as u64);
        Ok(())
    }

    async fn retry<F, Fut>(&self, mut op: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && attempt < self.config.max_attempts => {
                    metrics().rollup_conflicts.inc();
                    warn!(attempt, "Rollup write conflict, retrying: {err}");
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
                Err(err) => {
                    if err.is_transient() {
                        metrics().rollup_retries_exhausted.inc();
                    }
                    metrics().rollup_failures.inc();
                    return Err(err);
                }
            }
        }
    }
}

fn flag(envelope: &EventEnvelope, key: &str) -> bool {
    envelope.extra.get(key).and_then(Value::as_bool) == Some(true)
}

/// The daily-metric contribution of one event.
///
/// Visitor-identity counters ride as envelope hints (`firstVisit`,
/// `sessionStart`) because only the capture client can tell a brand-new
/// visitor from a returning one.
fn engagement_delta(envelope: &EventEnvelope) -> EngagementDelta {
    match envelope.kind {
        EventKind::PageView => {
            let mut delta = EngagementDelta::page_view();
            if flag(envelope, "firstVisit") {
                delta.unique_visitors = 1;
                delta.new_users = 1;
            } else if flag(envelope, "sessionStart") {
                delta.returning_users = 1;
            }
            delta
        }
        EventKind::SessionEnd => EngagementDelta::session_end(
            envelope.numeric_value.unwrap_or(0.0),
            envelope.page_view_count().unwrap_or(0),
        ),
        EventKind::Click
        | EventKind::ContentClick
        | EventKind::SocialShare
        | EventKind::FormSubmission
        | EventKind::Conversion => EngagementDelta::content_interaction(),
        EventKind::Custom if envelope.event_type == "comment" => {
            EngagementDelta::content_interaction()
        }
        _ => EngagementDelta::default(),
    }
}

/// The content row this event targets, if it names one.
fn content_target(envelope: &EventEnvelope) -> Option<ContentKey> {
    let content_id = envelope.extra.get("contentId").and_then(Value::as_i64)?;
    let content_type = envelope
        .extra
        .get("contentType")
        .and_then(Value::as_str)
        .unwrap_or("post");
    Some(ContentKey {
        tenant_id: envelope.tenant_id,
        content_type: content_type.to_string(),
        content_id,
        score_date: envelope.date(),
    })
}

fn content_delta(envelope: &EventEnvelope) -> ContentDelta {
    match envelope.kind {
        EventKind::ContentView => ContentDelta::impression(),
        EventKind::Click | EventKind::ContentClick => ContentDelta::click(),
        EventKind::SocialShare => ContentDelta::share(),
        EventKind::Conversion => ContentDelta::conversion(),
        EventKind::Custom if envelope.event_type == "comment" => ContentDelta {
            comment_count: 1,
            ..ContentDelta::default()
        },
        _ => ContentDelta::default(),
    }
}
