//! Common test setup functions.

use api::{router, AppState};
use axum_test::TestServer;
use engine_core::FunnelDefinition;
use event_store::EventStore;

/// Test context running the real router over an in-memory store.
///
/// Everything but the network listener is the production code path:
/// the real Axum router with all middleware, the real aggregator and
/// funnel tracker, and a real SQLite database held in memory.
pub struct TestContext {
    pub store: EventStore,
    pub state: AppState,
    pub server: TestServer,
}

impl TestContext {
    /// Create a new test context with all components initialized.
    pub async fn new() -> Self {
        let store = EventStore::in_memory()
            .await
            .expect("Failed to open in-memory store");

        // Mirrors the startup health probe.
        telemetry::health().store.set_healthy();
        telemetry::health().workers.set_healthy();

        let state = AppState::new(store.clone());
        let server =
            TestServer::new(router(state.clone())).expect("Failed to create test server");

        Self {
            store,
            state,
            server,
        }
    }

    /// Seeds an operator-authored funnel definition.
    ///
    /// Must run before the first event of the tenant arrives, since the
    /// tracker caches tenant definitions on first use.
    pub async fn seed_funnel(&self, def: &FunnelDefinition) {
        self.store
            .upsert_funnel_definition(def)
            .await
            .expect("Failed to seed funnel definition");
    }
}
