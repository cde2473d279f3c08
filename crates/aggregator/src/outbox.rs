//! Bounded outbox for rollup deltas that outlived their retry budget.
//!
//! The raw event is already durable when a delta lands here, so the
//! outbox only has to survive a storage brown-out, not a crash. A
//! background task drains it with exponential backoff; when the queue
//! is full the oldest delta is dropped and counted.

use std::collections::VecDeque;
use std::time::Duration;

use engine_core::{ContentDelta, ContentKey, DailyMetricKey, EngagementDelta, Result};
use event_store::EventStore;
use parking_lot::Mutex;
use telemetry::metrics;
use tracing::warn;

/// One deferred aggregate increment.
#[derive(Debug, Clone)]
pub enum PendingRollup {
    Engagement {
        key: DailyMetricKey,
        delta: EngagementDelta,
    },
    Content {
        key: ContentKey,
        delta: ContentDelta,
    },
}

impl PendingRollup {
    async fn apply(&self, store: &EventStore) -> Result<()> {
        match self {
            Self::Engagement { key, delta } => store.increment_daily_metric(key, delta).await,
            Self::Content { key, delta } => store.increment_content_performance(key, delta).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// Maximum queued deltas before the oldest is dropped.
    pub capacity: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

pub struct RollupOutbox {
    config: OutboxConfig,
    queue: Mutex<VecDeque<PendingRollup>>,
}

impl RollupOutbox {
    pub fn new(config: OutboxConfig) -> Self {
        Self {
            config,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &OutboxConfig {
        &self.config
    }

    /// Enqueues a delta, evicting the oldest entry when full.
    pub fn push(&self, pending: PendingRollup) {
        let mut queue = self.queue.lock();
        if queue.len() >= self.config.capacity {
            queue.pop_front();
            metrics().outbox_dropped.inc();
            warn!("Outbox full, dropped oldest pending rollup");
        }
        queue.push_back(pending);
        metrics().outbox_enqueued.inc();
        metrics().outbox_depth.set(queue.len() as u64);
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Drains the queue in arrival order. Stops at the first failure,
    /// putting the delta back at the head; returns how many were
    /// delivered.
    pub async fn flush(&self, store: &EventStore) -> Result<usize> {
        let mut delivered = 0;
        loop {
            let Some(pending) = self.queue.lock().pop_front() else {
                break;
            };

            if let Err(err) = pending.apply(store).await {
                self.queue.lock().push_front(pending);
                metrics().outbox_depth.set(self.len() as u64);
                metrics().outbox_retries.inc();
                return Err(err);
            }
            delivered += 1;
            metrics().outbox_delivered.inc();
        }

        metrics().outbox_depth.set(self.len() as u64);
        Ok(delivered)
    }
}
