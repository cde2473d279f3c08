//! Application state shared across handlers.

use std::sync::Arc;

use aggregator::{RollupAggregator, RollupConfig, SessionRegistry};
use event_store::EventStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Storage handle
    pub store: EventStore,
    /// Rollup aggregator (owns the funnel tracker and outbox)
    pub aggregator: Arc<RollupAggregator>,
    /// Live-session registry fed by the ingest path, drained by the sweep
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(store: EventStore) -> Self {
        Self::with_rollup_config(store, RollupConfig::default())
    }

    pub fn with_rollup_config(store: EventStore, config: RollupConfig) -> Self {
        Self {
            aggregator: Arc::new(RollupAggregator::with_config(store.clone(), config)),
            sessions: Arc::new(SessionRegistry::new()),
            store,
        }
    }
}
