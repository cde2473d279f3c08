//! Event capture client.
//!
//! Instrumented applications open explicit session contexts and record
//! events against them; delivery to the ingestion endpoint is
//! fire-and-forget.

pub mod client;
pub mod config;
pub mod ledger;
pub mod session;

pub use client::CaptureClient;
pub use config::CaptureConfig;
pub use ledger::{InMemoryVisitLedger, VisitLedger};
pub use session::{Session, SessionContext};
