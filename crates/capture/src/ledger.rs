//! First-visit tracking.
//!
//! Unique-visitor and new-user counts hinge on knowing whether this
//! client installation has ever recorded a page view before. Embedders
//! with durable storage implement [`VisitLedger`] on top of it; the
//! in-memory default is per-process only.

use std::sync::atomic::{AtomicBool, Ordering};

pub trait VisitLedger: Send + Sync {
    /// Marks the installation as visited. Returns `true` exactly once,
    /// on the first call ever.
    fn mark_visited(&self) -> bool;
}

/// Process-lifetime ledger.
#[derive(Debug, Default)]
pub struct InMemoryVisitLedger {
    visited: AtomicBool,
}

impl InMemoryVisitLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VisitLedger for InMemoryVisitLedger {
    fn mark_visited(&self) -> bool {
        !self.visited.swap(true, Ordering::SeqCst)
    }
}
