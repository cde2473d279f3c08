//! Internal metrics collection.
//!
//! Counters are collected in-memory and exposed through the metrics
//! endpoint as a point-in-time snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the rollup engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Ingestion metrics
    pub events_received: Counter,
    pub events_rejected: Counter,
    pub raw_events_inserted: Counter,
    pub duplicate_events: Counter,

    // Rollup metrics
    pub rollup_increments: Counter,
    pub rollup_conflicts: Counter,
    pub rollup_retries_exhausted: Counter,
    pub rollup_failures: Counter,

    // Funnel metrics
    pub funnel_entrances: Counter,
    pub funnel_advances: Counter,
    pub funnel_completions: Counter,

    // Session lifecycle
    pub sessions_opened: Counter,
    pub sessions_ended: Counter,
    pub sessions_expired: Counter,

    // Capture outbox
    pub outbox_enqueued: Counter,
    pub outbox_delivered: Counter,
    pub outbox_retries: Counter,
    pub outbox_dropped: Counter,

    // Latency histograms
    pub ingest_latency_ms: Histogram,
    pub rollup_latency_ms: Histogram,
    pub report_latency_ms: Histogram,

    // Gauges
    pub open_sessions: Gauge,
    pub outbox_depth: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub events_received: u64,
    pub events_rejected: u64,
    pub raw_events_inserted: u64,
    pub duplicate_events: u64,
    pub rollup_increments: u64,
    pub rollup_conflicts: u64,
    pub rollup_retries_exhausted: u64,
    pub rollup_failures: u64,
    pub funnel_entrances: u64,
    pub funnel_advances: u64,
    pub funnel_completions: u64,
    pub sessions_opened: u64,
    pub sessions_ended: u64,
    pub sessions_expired: u64,
    pub ingest_latency_mean_ms: f64,
    pub rollup_latency_mean_ms: f64,
    pub report_latency_mean_ms: f64,
    pub open_sessions: u64,
    pub outbox_depth: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            events_received: self.events_received.get(),
            events_rejected: self.events_rejected.get(),
            raw_events_inserted: self.raw_events_inserted.get(),
            duplicate_events: self.duplicate_events.get(),
            rollup_increments: self.rollup_increments.get(),
            rollup_conflicts: self.rollup_conflicts.get(),
            rollup_retries_exhausted: self.rollup_retries_exhausted.get(),
            rollup_failures: self.rollup_failures.get(),
            funnel_entrances: self.funnel_entrances.get(),
            funnel_advances: self.funnel_advances.get(),
            funnel_completions: self.funnel_completions.get(),
            sessions_opened: self.sessions_opened.get(),
            sessions_ended: self.sessions_ended.get(),
            sessions_expired: self.sessions_expired.get(),
            ingest_latency_mean_ms: self.ingest_latency_ms.mean(),
            rollup_latency_mean_ms: self.rollup_latency_ms.mean(),
            report_latency_mean_ms: self.report_latency_ms.mean(),
            open_sessions: self.open_sessions.get(),
            outbox_depth: self.outbox_depth.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
