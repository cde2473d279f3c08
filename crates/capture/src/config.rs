//! Capture client configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Base URL of the ingestion endpoint (e.g., "http://localhost:8080")
    pub endpoint: String,
    /// How often live sessions post a heartbeat
    pub heartbeat_interval: Duration,
    /// Per-request send timeout
    pub request_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            heartbeat_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl CaptureConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub(crate) fn track_event_url(&self) -> String {
        format!("{}/analytics/track-event", self.endpoint.trim_end_matches('/'))
    }
}
