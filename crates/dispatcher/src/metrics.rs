//! Per-outlet publish counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single outlet
#[derive(Debug, Default)]
pub struct OutletMetrics {
    /// Samples handed to the transport
    published: AtomicU64,
    /// Samples the transport refused
    failures: AtomicU64,
}

impl OutletMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn inc_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> OutletMetricsSnapshot {
        OutletMetricsSnapshot {
            published: self.published(),
            failures: self.failures(),
        }
    }
}

/// Snapshot of outlet metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutletMetricsSnapshot {
    pub published: u64,
    pub failures: u64,
}
