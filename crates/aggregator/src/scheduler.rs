//! Background worker scheduler.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use event_store::EventStore;
use telemetry::{health, metrics};
use tokio::time::interval;
use tracing::{error, info};

use crate::outbox::{PendingRollup, RollupOutbox};
use crate::retention::{RetentionConfig, RetentionWorker};
use crate::session_registry::SessionRegistry;

/// Worker scheduler configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Session expiry sweep interval
    pub sweep_interval: Duration,
    /// How long a session may idle before the sweep finalizes it
    pub session_idle_timeout: Duration,
    /// Retention check interval
    pub retention_interval: Duration,
    pub retention: RetentionConfig,
    /// How often the metrics snapshot is written to the log
    pub metrics_log_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            session_idle_timeout: Duration::from_secs(30 * 60),
            retention_interval: Duration::from_secs(3600), // 1 hour
            retention: RetentionConfig::default(),
            metrics_log_interval: Duration::from_secs(60),
        }
    }
}

/// Background worker scheduler.
pub struct WorkerScheduler {
    config: WorkerConfig,
    store: EventStore,
    registry: Arc<SessionRegistry>,
    outbox: Arc<RollupOutbox>,
}

impl WorkerScheduler {
    pub fn new(
        config: WorkerConfig,
        store: EventStore,
        registry: Arc<SessionRegistry>,
        outbox: Arc<RollupOutbox>,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            outbox,
        }
    }

    /// Starts all background workers.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        // Session expiry sweep
        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_session_sweep().await;
        }));

        // Outbox flush
        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_outbox_flush().await;
        }));

        // Retention worker
        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_retention_worker().await;
        }));

        // Metrics log flush
        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_metrics_log().await;
        }));

        health().workers.set_healthy();
        info!("Background workers started");
        handles
    }

    /// Drains deferred rollup deltas, backing off exponentially while
    /// the store keeps refusing them.
    async fn run_outbox_flush(&self) {
        let initial = self.outbox.config().initial_backoff;
        let max = self.outbox.config().max_backoff;
        let mut backoff = initial;

        loop {
            tokio::time::sleep(backoff).await;

            if self.outbox.is_empty() {
                backoff = initial;
                continue;
            }

            match self.outbox.flush(&self.store).await {
                Ok(delivered) => {
                    if delivered > 0 {
                        info!(delivered, "Flushed deferred rollup deltas");
                    }
                    backoff = initial;
                }
                Err(e) => {
                    error!(depth = self.outbox.len(), "Outbox flush failed: {e}");
                    backoff = (backoff * 2).min(max);
                }
            }
        }
    }

    /// Finalizes sessions that stopped sending heartbeats.
    async fn run_session_sweep(&self) {
        let idle = chrono::Duration::from_std(self.config.session_idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));
        let mut ticker = interval(self.config.sweep_interval);

        loop {
            ticker.tick().await;

            let expired = self.registry.sweep(Utc::now(), idle);
            let mut pass_ok = true;
            for session in expired {
                match self
                    .store
                    .increment_daily_metric(&session.key, &session.delta)
                    .await
                {
                    Ok(()) => {
                        metrics().sessions_expired.inc();
                        metrics().rollup_increments.inc();
                    }
                    Err(e) => {
                        error!(
                            session = %session.session_id,
                            "Failed to finalize expired session, deferring: {e}"
                        );
                        self.outbox.push(PendingRollup::Engagement {
                            key: session.key,
                            delta: session.delta,
                        });
                        health().workers.set_unhealthy(e.to_string());
                        pass_ok = false;
                    }
                }
            }
            if pass_ok {
                health().workers.set_healthy();
            }
        }
    }

    /// Writes a point-in-time metrics snapshot to the log.
    async fn run_metrics_log(&self) {
        let mut ticker = interval(self.config.metrics_log_interval);

        loop {
            ticker.tick().await;

            let snap = metrics().snapshot();
            info!(
                events_received = snap.events_received,
                events_rejected = snap.events_rejected,
                duplicate_events = snap.duplicate_events,
                rollup_increments = snap.rollup_increments,
                rollup_failures = snap.rollup_failures,
                funnel_entrances = snap.funnel_entrances,
                funnel_completions = snap.funnel_completions,
                open_sessions = snap.open_sessions,
                outbox_depth = snap.outbox_depth,
                ingest_latency_mean_ms = snap.ingest_latency_mean_ms,
                "Metrics snapshot"
            );
        }
    }

    async fn run_retention_worker(&self) {
        let worker = RetentionWorker::new(self.store.clone(), self.config.retention.clone());
        let mut ticker = interval(self.config.retention_interval);

        loop {
            ticker.tick().await;

            if let Err(e) = worker.run().await {
                error!("Retention worker error: {}", e);
            }
        }
    }
}
