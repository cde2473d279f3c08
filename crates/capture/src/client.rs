//! The capture client.
//!
//! Owns the HTTP transport and the first-visit ledger; sessions borrow
//! both. Every send is spawned and fire-and-forget: a failed delivery
//! is logged and dropped, never surfaced to the instrumented code path.

use std::sync::Arc;

use engine_core::{classify_browser, classify_device, Error, Result};
use serde_json::Value;
use tracing::warn;

use crate::config::CaptureConfig;
use crate::ledger::{InMemoryVisitLedger, VisitLedger};
use crate::session::Session;

#[derive(Clone)]
pub struct CaptureClient {
    config: Arc<CaptureConfig>,
    http: reqwest::Client,
    ledger: Arc<dyn VisitLedger>,
}

impl CaptureClient {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        Self::with_ledger(config, Arc::new(InMemoryVisitLedger::new()))
    }

    pub fn with_ledger(config: CaptureConfig, ledger: Arc<dyn VisitLedger>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            http,
            ledger,
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Opens an explicit session context for one visitor.
    ///
    /// Device and browser are classified from the user agent once, at
    /// session start, and stamped on every event the session emits.
    pub fn begin_session(&self, tenant_id: i64, user_agent: &str) -> Result<Session> {
        if tenant_id <= 0 {
            return Err(Error::invalid_tenant(format!(
                "tenantId must be positive, got {tenant_id}"
            )));
        }

        let device_type = classify_device(user_agent);
        let browser = classify_browser(user_agent);
        Ok(Session::new(self.clone(), tenant_id, device_type, browser))
    }

    pub(crate) fn mark_visited(&self) -> bool {
        self.ledger.mark_visited()
    }

    /// Posts one envelope without blocking the caller.
    pub(crate) fn send(&self, envelope: Value) {
        let http = self.http.clone();
        let url = self.config.track_event_url();

        tokio::spawn(async move {
            match http.post(&url).json(&envelope).send().await {
                Ok(response) if !response.status().is_success() => {
                    warn!(
                        status = %response.status(),
                        "Ingestion endpoint rejected event"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to deliver event: {e}");
                }
            }
        });
    }
}
