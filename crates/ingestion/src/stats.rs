//! Per-inlet ingestion counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion counters shared between a worker and its registry entry
#[derive(Debug, Default)]
pub struct InletStats {
    /// Records decoded and appended
    pub samples_ingested: AtomicU64,

    /// Failed pulls
    pub pull_errors: AtomicU64,

    /// Payloads that did not match the stream's schema
    pub decode_errors: AtomicU64,

    /// Samples discarded from the transport when stopping
    pub samples_flushed: AtomicU64,
}

impl InletStats {
    /// Create new stats instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one appended record
    pub fn record_ingested(&self) -> u64 {
        self.samples_ingested.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record pull error
    pub fn record_pull_error(&self) {
        self.pull_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record decode error
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record transport-side residue dropped on stop
    pub fn record_flushed(&self, count: usize) {
        self.samples_flushed.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> InletStatsSnapshot {
        InletStatsSnapshot {
            samples_ingested: self.samples_ingested.load(Ordering::Relaxed),
            pull_errors: self.pull_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            samples_flushed: self.samples_flushed.load(Ordering::Relaxed),
        }
    }
}

/// Stats snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InletStatsSnapshot {
    pub samples_ingested: u64,
    pub pull_errors: u64,
    pub decode_errors: u64,
    pub samples_flushed: u64,
}
