//! Ingestion worker: one OS thread per active subscription.
//!
//! The loop is cooperative: it polls a stop flag between pulls, and each pull
//! blocks for at most the pull timeout, which bounds shutdown latency.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{seconds_to_us, ContractError, InletHandle};
use tracing::{debug, error, info, trace, warn};

use crate::{InletBuffer, InletStats, SubscriptionId};

/// Every how many records the buffer depth gauge is refreshed.
const DEPTH_REPORT_INTERVAL: u64 = 256;

/// Everything a worker thread owns or shares.
pub(crate) struct WorkerContext {
    pub id: SubscriptionId,
    pub handle: Arc<dyn InletHandle>,
    pub buffer: Arc<InletBuffer>,
    pub stats: Arc<InletStats>,
    pub pull_timeout: Duration,
    /// Offset from the probe at subscribe time, used until a fresh one is read.
    pub initial_offset: f64,
}

/// Handle to a running ingestion thread.
pub(crate) struct IngestionWorker {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl IngestionWorker {
    pub fn spawn(ctx: WorkerContext) -> Result<Self, ContractError> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let name = format!("inlet-{}-{}", ctx.id, ctx.buffer.kind());

        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || run(ctx, &thread_stop))?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Thread exists and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Acquire)
            && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Request stop and join. Safe to call more than once.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("ingestion worker panicked");
            }
        }
    }
}

impl Drop for IngestionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Length of the current run of failed pulls.
#[derive(Debug, Default)]
struct PullHealth {
    failures: u64,
}

impl PullHealth {
    /// Count a failure; true only for the first of a run.
    fn failed(&mut self) -> bool {
        self.failures += 1;
        self.failures == 1
    }

    /// Reset after a successful pull; returns the length of the run it ended.
    fn recovered(&mut self) -> Option<u64> {
        match std::mem::take(&mut self.failures) {
            0 => None,
            n => Some(n),
        }
    }
}

fn run(ctx: WorkerContext, stop: &AtomicBool) {
    let WorkerContext {
        id,
        handle,
        buffer,
        stats,
        pull_timeout,
        initial_offset,
    } = ctx;
    let kind = buffer.kind();
    let _span = observability::inlet_span(id.get(), kind).entered();
    let mut offset = initial_offset;
    let mut health = PullHealth::default();

    debug!(inlet_id = %id, kind = %kind, "ingestion worker started");

    while !stop.load(Ordering::Acquire) {
        let pulled = handle.pull(pull_timeout);
        if pulled.is_ok() {
            if let Some(failures) = health.recovered() {
                info!(inlet_id = %id, kind = %kind, failures, "pull recovered");
            }
        }
        let sample = match pulled {
            Ok(Some(sample)) => sample,
            Ok(None) => continue,
            Err(e) => {
                if health.failed() {
                    warn!(inlet_id = %id, kind = %kind, error = %e, "pull failed");
                } else {
                    debug!(
                        inlet_id = %id,
                        kind = %kind,
                        error = %e,
                        failures = health.failures,
                        "pull still failing"
                    );
                }
                stats.record_pull_error();
                observability::record_pull_error(kind);
                // avoid spinning on a broken handle
                thread::sleep(pull_timeout);
                continue;
            }
        };
        if sample.timestamp <= 0.0 {
            continue;
        }

        // the offset drifts, refresh it on every sample
        match handle.time_offset(Duration::ZERO) {
            Ok(fresh) => offset = fresh,
            Err(e) => trace!(inlet_id = %id, error = %e, "time offset unavailable, reusing last"),
        }

        let remote_time = seconds_to_us(sample.timestamp);
        let local_time = seconds_to_us(sample.timestamp + offset);

        match buffer.append(&sample.values, remote_time, local_time) {
            Ok(()) => {
                let ingested = stats.record_ingested();
                observability::record_sample_ingested(kind);
                if ingested % DEPTH_REPORT_INTERVAL == 0 {
                    observability::record_buffer_depth(id.get(), kind, buffer.len());
                }
            }
            Err(e) => {
                warn!(inlet_id = %id, kind = %kind, error = %e, "dropping undecodable sample");
                stats.record_decode_error();
            }
        }
    }

    debug!(inlet_id = %id, kind = %kind, "ingestion worker stopped");
}
