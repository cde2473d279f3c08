//! Internal telemetry for the rollup engine.
//!
//! Metrics are kept in-process and served from the engine's own
//! metrics endpoint rather than pushed to an external system.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
