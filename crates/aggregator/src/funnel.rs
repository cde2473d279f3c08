//! Session-scoped funnel tracking.
//!
//! Definitions are cached per tenant with a short TTL so operator edits
//! show up without a restart. Per-session progress lives in a TTL cache
//! sized to the session idle timeout; a session that goes quiet simply
//! ages out of its funnels.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use engine_core::{funnel::advance, EventEnvelope, FunnelDefinition, Result};
use event_store::EventStore;
use moka::future::Cache;
use telemetry::metrics;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FunnelConfig {
    /// How long cached definitions are trusted.
    pub definition_ttl: Duration,
    /// How long idle sessions keep their funnel position.
    pub progress_ttl: Duration,
    pub max_tracked_sessions: u64,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            definition_ttl: Duration::from_secs(60),
            progress_ttl: Duration::from_secs(30 * 60),
            max_tracked_sessions: 100_000,
        }
    }
}

/// Where one session currently stands in one funnel.
#[derive(Debug, Clone, Copy)]
struct Progress {
    last_step: usize,
    entered_at: DateTime<Utc>,
}

pub struct FunnelTracker {
    store: EventStore,
    definitions: Cache<i64, Arc<Vec<FunnelDefinition>>>,
    progress: Cache<(i64, String), Progress>,
}

impl FunnelTracker {
    pub fn new(store: EventStore) -> Self {
        Self::with_config(store, FunnelConfig::default())
    }

    pub fn with_config(store: EventStore, config: FunnelConfig) -> Self {
        Self {
            store,
            definitions: Cache::builder()
                .time_to_live(config.definition_ttl)
                .max_capacity(10_000)
                .build(),
            progress: Cache::builder()
                .time_to_live(config.progress_ttl)
                .max_capacity(config.max_tracked_sessions)
                .build(),
        }
    }

    /// Runs one event through every funnel of its tenant.
    ///
    /// Progression is forward-only and exact-next-step, so replayed or
    /// out-of-order matches never inflate a step count.
    pub async fn observe(&self, envelope: &EventEnvelope) -> Result<()> {
        let Some(session_id) = envelope.session_id.as_deref() else {
            return Ok(());
        };

        let definitions = self.tenant_definitions(envelope.tenant_id).await?;
        for def in definitions.iter() {
            let Some(matched) =
                def.matching_step(envelope.action.as_deref(), envelope.label.as_deref())
            else {
                continue;
            };

            let key = (def.funnel_id, session_id.to_string());
            let current = self.progress.get(&key).await;
            let Some(next) = advance(current.map(|p| p.last_step), matched) else {
                continue;
            };

            if next == 0 {
                self.store
                    .record_funnel_entrance(def.funnel_id, envelope.date())
                    .await?;
                metrics().funnel_entrances.inc();
                debug!(
                    funnel = def.funnel_id,
                    session = session_id,
                    "Session entered funnel"
                );
            } else {
                self.store
                    .record_funnel_step(def.funnel_id, envelope.date(), next as i64)
                    .await?;
                metrics().funnel_advances.inc();
            }

            let entered_at = current.map(|p| p.entered_at).unwrap_or(envelope.timestamp);

            if next == def.terminal_step() {
                let elapsed =
                    (envelope.timestamp - entered_at).num_milliseconds().max(0) as f64 / 1000.0;
                self.store
                    .record_funnel_completion(def.funnel_id, envelope.date(), elapsed)
                    .await?;
                metrics().funnel_completions.inc();
                self.progress.invalidate(&key).await;
            } else {
                self.progress
                    .insert(
                        key,
                        Progress {
                            last_step: next,
                            entered_at,
                        },
                    )
                    .await;
            }
        }

        Ok(())
    }

    async fn tenant_definitions(&self, tenant_id: i64) -> Result<Arc<Vec<FunnelDefinition>>> {
        if let Some(defs) = self.definitions.get(&tenant_id).await {
            return Ok(defs);
        }
        let defs = Arc::new(self.store.list_funnel_definitions(tenant_id).await?);
        self.definitions.insert(tenant_id, defs.clone()).await;
        Ok(defs)
    }
}
