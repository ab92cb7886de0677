//! Subscription Registry
//!
//! Owns every inlet subscription by [`SubscriptionId`] and routes typed
//! queries to the matching [`SampleBuffer`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    is_own_source_id, BufferSide, CountQuery, InletConfig, InletHandle, StreamDescriptor,
    StreamFilter, StreamKind, TimeRange, Transport,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::worker::{IngestionWorker, WorkerContext};
use crate::{
    BufferedRecord, IngestionError, InletBuffer, InletStats, InletStatsSnapshot, Result,
    SampleBuffer,
};

static NEXT_INLET_ID: AtomicU32 = AtomicU32::new(0);

/// Process-unique inlet identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u32);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_INLET_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
impl From<u32> for SubscriptionId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One inlet: transport handle, buffer and (while listening) its worker.
struct Subscription {
    id: SubscriptionId,
    descriptor: StreamDescriptor,
    handle: Arc<dyn InletHandle>,
    buffer: Arc<InletBuffer>,
    stats: Arc<InletStats>,
    worker: Mutex<Option<IngestionWorker>>,
    initial_offset: f64,
}

impl Subscription {
    fn kind(&self) -> StreamKind {
        self.buffer.kind()
    }

    fn is_listening(&self) -> bool {
        self.worker.lock().as_ref().is_some_and(|w| w.is_running())
    }

    fn start(&self, open_timeout: Duration, pull_timeout: Duration) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| w.is_running()) {
            return Ok(());
        }
        // a worker that exited on its own still needs joining
        if let Some(mut stale) = worker.take() {
            stale.stop();
        }

        self.handle.open_stream(open_timeout)?;
        *worker = Some(IngestionWorker::spawn(WorkerContext {
            id: self.id,
            handle: self.handle.clone(),
            buffer: self.buffer.clone(),
            stats: self.stats.clone(),
            pull_timeout,
            initial_offset: self.initial_offset,
        })?);
        Ok(())
    }

    /// Join the worker, then close and flush the transport side.
    ///
    /// The slot stays locked until the handle is closed so a concurrent
    /// `start` cannot open the stream in between.
    fn stop(&self, clear_buffer: bool) {
        let mut slot = self.worker.lock();
        if let Some(mut worker) = slot.take() {
            worker.stop();
            self.handle.close_stream();
            let flushed = self.handle.flush();
            if flushed > 0 {
                self.stats.record_flushed(flushed);
                debug!(inlet_id = %self.id, flushed, "discarded transport-side residue");
            }
        }
        drop(slot);
        if clear_buffer {
            self.buffer.clear();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop(false);
    }
}

/// Registry of inlet subscriptions.
///
/// Lifecycle operations take the map's write lock only to insert or remove;
/// joins and queries run outside it.
pub struct InletRegistry {
    transport: Arc<dyn Transport>,
    config: InletConfig,
    discovery_timeout: Duration,
    inlets: RwLock<HashMap<SubscriptionId, Arc<Subscription>>>,
}

impl fmt::Debug for InletRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InletRegistry")
            .field("config", &self.config)
            .field("inlets", &self.inlets.read().len())
            .finish()
    }
}

impl InletRegistry {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: InletConfig,
        discovery_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            config,
            discovery_timeout,
            inlets: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &InletConfig {
        &self.config
    }

    /// Streams on the network published by this system, optionally of one kind.
    #[instrument(name = "inlet_remote_streams", level = "debug", skip(self))]
    pub fn remote_streams(&self, kind: Option<StreamKind>) -> Result<Vec<StreamDescriptor>> {
        let streams = self
            .transport
            .discover(&StreamFilter::Any, self.discovery_timeout)?
            .into_iter()
            .filter(|d| is_own_source_id(&d.source_id))
            .filter(|d| kind.is_none() || d.kind() == kind)
            .collect::<Vec<_>>();
        debug!(count = streams.len(), "discovered streams");
        Ok(streams)
    }

    /// Resolve `source_id` to exactly one stream and subscribe to it.
    pub fn create_listener_for_source(
        &self,
        source_id: &str,
        capacity: Option<usize>,
        start_listening: Option<bool>,
    ) -> Result<SubscriptionId> {
        if source_id.is_empty() {
            return Err(IngestionError::InvalidArgument {
                message: "source id must not be empty".to_string(),
            });
        }

        let mut found = self.transport.discover(
            &StreamFilter::SourceId(source_id.to_string()),
            self.discovery_timeout,
        )?;
        let descriptor = match found.len() {
            0 => {
                return Err(IngestionError::StreamNotFound {
                    source_id: source_id.to_string(),
                })
            }
            1 => found.remove(0),
            count => {
                return Err(IngestionError::Ambiguous {
                    source_id: source_id.to_string(),
                    count,
                })
            }
        };
        self.create_listener(&descriptor, capacity, start_listening)
    }

    /// Subscribe to `descriptor`.
    ///
    /// `capacity` and `start_listening` default to the inlet configuration.
    #[instrument(
        name = "inlet_create_listener",
        skip(self, descriptor),
        fields(source_id = %descriptor.source_id)
    )]
    pub fn create_listener(
        &self,
        descriptor: &StreamDescriptor,
        capacity: Option<usize>,
        start_listening: Option<bool>,
    ) -> Result<SubscriptionId> {
        if !is_own_source_id(&descriptor.source_id) {
            return Err(IngestionError::ForeignStream {
                name: descriptor.name.clone(),
                source_id: descriptor.source_id.clone(),
            });
        }
        let kind = descriptor.kind().ok_or_else(|| IngestionError::UnknownType {
            name: descriptor.name.clone(),
            type_tag: descriptor.type_tag.clone(),
        })?;

        let id = SubscriptionId::next();
        let capacity = capacity.unwrap_or_else(|| self.config.capacity.for_kind(kind));
        let handle = self.transport.open(descriptor)?;
        let initial_offset = handle.time_offset(self.config.time_correction_timeout())?;

        let subscription = Arc::new(Subscription {
            id,
            descriptor: descriptor.clone(),
            handle,
            buffer: Arc::new(InletBuffer::new(kind, capacity)),
            stats: Arc::new(InletStats::new()),
            worker: Mutex::new(None),
            initial_offset,
        });

        if start_listening.unwrap_or(self.config.start_on_create) {
            subscription.start(self.config.open_timeout(), self.config.pull_timeout())?;
        }
        self.inlets.write().insert(id, subscription);

        info!(inlet_id = %id, kind = %kind, capacity, initial_offset, "inlet created");
        Ok(id)
    }

    /// Start ingestion. No-op if already listening.
    #[instrument(name = "inlet_start_listening", skip(self), fields(inlet_id = %id))]
    pub fn start_listening(&self, id: SubscriptionId) -> Result<()> {
        let subscription = self.get(id)?;
        subscription.start(self.config.open_timeout(), self.config.pull_timeout())?;
        debug!(inlet_id = %id, kind = %subscription.kind(), "listening");
        Ok(())
    }

    /// Worker exists and has not been asked to stop.
    pub fn is_listening(&self, id: SubscriptionId) -> Result<bool> {
        Ok(self.get(id)?.is_listening())
    }

    /// Stop ingestion, optionally clearing the buffer (default: keep it).
    #[instrument(name = "inlet_stop_listening", skip(self), fields(inlet_id = %id))]
    pub fn stop_listening(&self, id: SubscriptionId, clear_buffer: Option<bool>) -> Result<()> {
        let subscription = self.get(id)?;
        subscription.stop(clear_buffer.unwrap_or(false));
        debug!(inlet_id = %id, "stopped listening");
        Ok(())
    }

    /// Stop and remove the subscription. Unknown ids fail with `InletNotFound`.
    #[instrument(name = "inlet_delete_listener", skip(self), fields(inlet_id = %id))]
    pub fn delete_listener(&self, id: SubscriptionId) -> Result<()> {
        let subscription = self
            .inlets
            .write()
            .remove(&id)
            .ok_or(IngestionError::InletNotFound { id })?;
        subscription.stop(false);
        info!(inlet_id = %id, kind = %subscription.kind(), "inlet deleted");
        Ok(())
    }

    /// Delete every subscription.
    pub fn delete_all(&self) {
        let drained: Vec<_> = self.inlets.write().drain().collect();
        for (id, subscription) in drained {
            subscription.stop(false);
            debug!(inlet_id = %id, "inlet deleted");
        }
    }

    pub fn listener_ids(&self) -> Vec<SubscriptionId> {
        let mut ids: Vec<_> = self.inlets.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn inlet_descriptor(&self, id: SubscriptionId) -> Result<StreamDescriptor> {
        Ok(self.get(id)?.descriptor.clone())
    }

    pub fn inlet_kind(&self, id: SubscriptionId) -> Result<StreamKind> {
        Ok(self.get(id)?.kind())
    }

    pub fn buffer_len(&self, id: SubscriptionId) -> Result<usize> {
        Ok(self.get(id)?.buffer.len())
    }

    pub fn inlet_stats(&self, id: SubscriptionId) -> Result<InletStatsSnapshot> {
        Ok(self.get(id)?.stats.snapshot())
    }

    // ------------------------------------------------------------------
    // Typed queries
    // ------------------------------------------------------------------

    /// Remove `count` records (default: all) from `side` (default: start).
    pub fn consume_n<R: BufferedRecord>(
        &self,
        id: SubscriptionId,
        count: Option<usize>,
        side: Option<BufferSide>,
    ) -> Result<Vec<R>> {
        let query = CountQuery::consume(count, side);
        self.with_buffer(id, |b: &SampleBuffer<R>| Ok(b.consume_n(query)))
    }

    /// Copy `count` records (default: 1) from `side` (default: end).
    pub fn peek_n<R: BufferedRecord>(
        &self,
        id: SubscriptionId,
        count: Option<usize>,
        side: Option<BufferSide>,
    ) -> Result<Vec<R>> {
        let query = CountQuery::peek(count, side);
        self.with_buffer(id, |b: &SampleBuffer<R>| Ok(b.peek_n(query)))
    }

    /// Remove records with `start <= time <= end`; defaults to everything on local time.
    pub fn consume_time_range<R: BufferedRecord>(
        &self,
        id: SubscriptionId,
        start: Option<i64>,
        end: Option<i64>,
        use_local_time: Option<bool>,
    ) -> Result<Vec<R>> {
        let range = TimeRange::new(start, end, use_local_time);
        self.with_buffer(id, |b: &SampleBuffer<R>| b.consume_time_range(range))
    }

    /// Copy records with `start <= time <= end`; defaults to everything on local time.
    pub fn peek_time_range<R: BufferedRecord>(
        &self,
        id: SubscriptionId,
        start: Option<i64>,
        end: Option<i64>,
        use_local_time: Option<bool>,
    ) -> Result<Vec<R>> {
        let range = TimeRange::new(start, end, use_local_time);
        self.with_buffer(id, |b: &SampleBuffer<R>| b.peek_time_range(range))
    }

    /// Discard every buffered record. Returns the number discarded.
    pub fn clear(&self, id: SubscriptionId) -> Result<usize> {
        Ok(self.get(id)?.buffer.clear())
    }

    /// Discard records in a time range. Not supported for positioning inlets.
    pub fn clear_time_range(
        &self,
        id: SubscriptionId,
        start: Option<i64>,
        end: Option<i64>,
        use_local_time: Option<bool>,
    ) -> Result<usize> {
        let range = TimeRange::new(start, end, use_local_time);
        self.get(id)?.buffer.clear_time_range(range)
    }

    fn get(&self, id: SubscriptionId) -> Result<Arc<Subscription>> {
        self.inlets
            .read()
            .get(&id)
            .cloned()
            .ok_or(IngestionError::InletNotFound { id })
    }

    /// Resolve `id` and run `f` on its buffer if it holds `R` records.
    fn with_buffer<R, T>(
        &self,
        id: SubscriptionId,
        f: impl FnOnce(&SampleBuffer<R>) -> Result<T>,
    ) -> Result<T>
    where
        R: BufferedRecord,
    {
        let subscription = self.get(id)?;
        match R::select(&subscription.buffer) {
            Some(buffer) => f(buffer),
            None => {
                let actual = subscription.kind();
                error!(
                    inlet_id = %id,
                    expected = %R::KIND,
                    actual = %actual,
                    "record type does not match inlet stream kind"
                );
                Err(IngestionError::TypeMismatch {
                    id,
                    expected: R::KIND,
                    actual,
                })
            }
        }
    }
}

impl Drop for InletRegistry {
    fn drop(&mut self) {
        let count = self.inlets.get_mut().len();
        if count > 0 {
            warn!(count, "registry dropped with live inlets, stopping them");
            self.delete_all();
        }
    }
}
