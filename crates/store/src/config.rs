//! Store configuration.

use serde::{Deserialize, Serialize};

/// SQLite store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database URL (e.g., "sqlite://analytics.db")
    pub url: String,
    /// Connection pool size
    pub max_connections: u32,
    /// How long a writer waits on a locked database before the
    /// increment surfaces as a transient conflict (milliseconds)
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://analytics.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5000,
        }
    }
}
