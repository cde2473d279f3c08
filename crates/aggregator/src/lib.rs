//! Rollup aggregation pipeline.
//!
//! One validated event in, a handful of atomic counter increments out.
//! Also home to the funnel tracker, the live-session registry with its
//! expiry sweep, and the retention worker.

pub mod funnel;
pub mod outbox;
pub mod retention;
pub mod rollup;
pub mod scheduler;
pub mod session_registry;

pub use funnel::{FunnelConfig, FunnelTracker};
pub use outbox::{OutboxConfig, PendingRollup, RollupOutbox};
pub use retention::{RetentionConfig, RetentionWorker};
pub use rollup::{RollupAggregator, RollupConfig};
pub use scheduler::{WorkerConfig, WorkerScheduler};
pub use session_registry::{ExpiredSession, SessionRegistry};
