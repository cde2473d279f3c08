//! Retention worker.
//!
//! Raw events are kept long enough to rebuild aggregates and audit
//! disputes, then dropped; keyword samples age out on their own longer
//! horizon. Aggregate rows are never purged.

use chrono::{DateTime, Days, NaiveDate, Utc};
use engine_core::Result;
use event_store::EventStore;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub raw_event_days: u64,
    pub keyword_sample_days: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            raw_event_days: 90,
            keyword_sample_days: 365,
        }
    }
}

pub struct RetentionWorker {
    store: EventStore,
    config: RetentionConfig,
}

impl RetentionWorker {
    pub fn new(store: EventStore, config: RetentionConfig) -> Self {
        Self { store, config }
    }

    /// Runs one retention pass.
    pub async fn run(&self) -> Result<()> {
        let now = Utc::now();

        let raw_cutoff = raw_event_cutoff(now, self.config.raw_event_days);
        let removed = self.store.purge_raw_events_before(raw_cutoff).await?;
        if removed > 0 {
            info!(removed, cutoff = %raw_cutoff, "Purged expired raw events");
        }

        let keyword_cutoff = keyword_cutoff(now, self.config.keyword_sample_days);
        let removed = self.store.purge_keyword_samples_before(keyword_cutoff).await?;
        if removed > 0 {
            info!(removed, cutoff = %keyword_cutoff, "Purged expired keyword samples");
        }

        Ok(())
    }
}

fn raw_event_cutoff(now: DateTime<Utc>, days: u64) -> DateTime<Utc> {
    now.checked_sub_days(Days::new(days)).unwrap_or(now)
}

fn keyword_cutoff(now: DateTime<Utc>, days: u64) -> NaiveDate {
    raw_event_cutoff(now, days).date_naive()
}
