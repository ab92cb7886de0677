//! In-process broadcast transport
//!
//! Outlets register on a shared [`Network`]; every open inlet owns an
//! unbounded crossbeam channel the outlet fans frames out to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{
    ContractError, InletHandle, OutletChannel, PulledSample, SampleValues, StreamDescriptor,
    StreamFilter, Transport,
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{clock, wire};

/// How often `discover` re-checks the network while waiting.
const DISCOVERY_POLL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct Network {
    next_key: u64,
    outlets: Vec<OutletEntry>,
}

struct OutletEntry {
    key: u64,
    descriptor: StreamDescriptor,
    subscribers: Vec<(u64, Sender<Bytes>)>,
}

impl Network {
    fn outlet_mut(&mut self, key: u64) -> Option<&mut OutletEntry> {
        self.outlets.iter_mut().find(|o| o.key == key)
    }

    fn next_key(&mut self) -> u64 {
        self.next_key += 1;
        self.next_key
    }
}

/// Loopback transport. Cloning shares the same network.
#[derive(Clone)]
pub struct LoopbackTransport {
    network: Arc<Mutex<Network>>,
    hostname: String,
    /// f64 bits; seconds added to remote timestamps by inlets opened afterwards
    clock_offset: Arc<AtomicU64>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("hostname", &self.hostname)
            .field("outlets", &self.network.lock().outlets.len())
            .finish()
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            network: Arc::new(Mutex::new(Network::default())),
            hostname: "loopback".to_string(),
            clock_offset: Arc::new(AtomicU64::new(0.0f64.to_bits())),
        }
    }

    /// Clock offset reported by inlets, in seconds.
    pub fn set_clock_offset(&self, offset_s: f64) {
        self.clock_offset.store(offset_s.to_bits(), Ordering::Relaxed);
    }

    pub fn clock_offset(&self) -> f64 {
        f64::from_bits(self.clock_offset.load(Ordering::Relaxed))
    }

    /// Number of live outlets.
    pub fn outlet_count(&self) -> usize {
        self.network.lock().outlets.len()
    }
}

impl Transport for LoopbackTransport {
    fn create_outlet(
        &self,
        mut descriptor: StreamDescriptor,
    ) -> Result<Box<dyn OutletChannel>, ContractError> {
        if descriptor.hostname.is_empty() {
            descriptor.hostname = self.hostname.clone();
        }

        let mut network = self.network.lock();
        let key = network.next_key();
        network.outlets.push(OutletEntry {
            key,
            descriptor: descriptor.clone(),
            subscribers: Vec::new(),
        });
        debug!(name = %descriptor.name, source_id = %descriptor.source_id, "outlet registered");

        Ok(Box::new(LoopbackOutlet {
            key,
            descriptor,
            network: Arc::downgrade(&self.network),
        }))
    }

    fn discover(
        &self,
        filter: &StreamFilter,
        timeout: Duration,
    ) -> Result<Vec<StreamDescriptor>, ContractError> {
        let deadline = Instant::now() + timeout;
        loop {
            let found: Vec<_> = self
                .network
                .lock()
                .outlets
                .iter()
                .filter(|o| filter.matches(&o.descriptor))
                .map(|o| o.descriptor.clone())
                .collect();
            if !found.is_empty() || Instant::now() >= deadline {
                return Ok(found);
            }
            thread::sleep(DISCOVERY_POLL);
        }
    }

    fn open(&self, descriptor: &StreamDescriptor) -> Result<Arc<dyn InletHandle>, ContractError> {
        let network = self.network.lock();
        // newest outlet wins when several publish the same stream
        let entry = network
            .outlets
            .iter()
            .rev()
            .find(|o| {
                o.descriptor.source_id == descriptor.source_id
                    && o.descriptor.name == descriptor.name
                    && o.descriptor.type_tag == descriptor.type_tag
            })
            .ok_or_else(|| {
                ContractError::transport(
                    "open",
                    format!("no outlet publishes '{}'", descriptor.source_id),
                )
            })?;

        Ok(Arc::new(LoopbackInlet {
            outlet_key: entry.key,
            descriptor: entry.descriptor.clone(),
            network: Arc::downgrade(&self.network),
            clock_offset: self.clock_offset(),
            connection: Mutex::new(None),
        }))
    }

    fn local_clock(&self) -> f64 {
        clock::now_s()
    }
}

/// Publishing side of one loopback stream. Dropping it withdraws the stream.
pub struct LoopbackOutlet {
    key: u64,
    descriptor: StreamDescriptor,
    network: Weak<Mutex<Network>>,
}

impl OutletChannel for LoopbackOutlet {
    fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    fn publish(&self, values: SampleValues, timestamp: Option<f64>) -> Result<(), ContractError> {
        let network = self
            .network
            .upgrade()
            .ok_or_else(|| ContractError::transport("publish", "network shut down"))?;
        let frame = wire::encode(&values, timestamp.unwrap_or_else(clock::now_s));

        let mut network = network.lock();
        let entry = network
            .outlet_mut(self.key)
            .ok_or_else(|| ContractError::transport("publish", "outlet withdrawn"))?;
        // inlets whose receiver is gone are dropped here
        entry
            .subscribers
            .retain(|(_, tx)| tx.send(frame.clone()).is_ok());
        trace!(name = %self.descriptor.name, consumers = entry.subscribers.len(), "frame published");
        Ok(())
    }

    fn has_consumers(&self) -> bool {
        let Some(network) = self.network.upgrade() else {
            return false;
        };
        let network = network.lock();
        let consumers = network
            .outlets
            .iter()
            .find(|o| o.key == self.key)
            .is_some_and(|o| !o.subscribers.is_empty());
        consumers
    }
}

impl Drop for LoopbackOutlet {
    fn drop(&mut self) {
        if let Some(network) = self.network.upgrade() {
            network.lock().outlets.retain(|o| o.key != self.key);
            debug!(name = %self.descriptor.name, "outlet withdrawn");
        }
    }
}

struct Connection {
    key: u64,
    rx: Receiver<Bytes>,
    /// False once the stream is closed; the receiver is kept so residue can be flushed.
    open: bool,
}

/// Receiving side of one loopback stream.
pub struct LoopbackInlet {
    outlet_key: u64,
    descriptor: StreamDescriptor,
    network: Weak<Mutex<Network>>,
    clock_offset: f64,
    connection: Mutex<Option<Connection>>,
}

impl LoopbackInlet {
    fn unsubscribe(&self, key: u64) {
        if let Some(network) = self.network.upgrade() {
            if let Some(entry) = network.lock().outlet_mut(self.outlet_key) {
                entry.subscribers.retain(|(k, _)| *k != key);
            }
        }
    }
}

impl InletHandle for LoopbackInlet {
    fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    fn open_stream(&self, _timeout: Duration) -> Result<(), ContractError> {
        let mut connection = self.connection.lock();
        if connection.as_ref().is_some_and(|c| c.open) {
            return Ok(());
        }

        let network = self
            .network
            .upgrade()
            .ok_or_else(|| ContractError::transport("open_stream", "network shut down"))?;
        let mut network = network.lock();
        let key = network.next_key();
        let entry = network.outlet_mut(self.outlet_key).ok_or_else(|| {
            ContractError::transport("open_stream", format!("stream '{}' lost", self.descriptor.name))
        })?;

        let (tx, rx) = unbounded();
        entry.subscribers.push((key, tx));
        *connection = Some(Connection { key, rx, open: true });
        Ok(())
    }

    fn pull(&self, timeout: Duration) -> Result<Option<PulledSample>, ContractError> {
        let rx = self
            .connection
            .lock()
            .as_ref()
            .filter(|c| c.open)
            .map(|c| c.rx.clone());
        let Some(rx) = rx else {
            thread::sleep(timeout);
            return Ok(None);
        };

        match rx.recv_timeout(timeout) {
            Ok(frame) => wire::decode(&frame).map(Some),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ContractError::transport(
                "pull",
                format!("stream '{}' lost", self.descriptor.name),
            )),
        }
    }

    fn time_offset(&self, _timeout: Duration) -> Result<f64, ContractError> {
        Ok(self.clock_offset)
    }

    fn close_stream(&self) {
        let mut connection = self.connection.lock();
        if let Some(c) = connection.as_mut().filter(|c| c.open) {
            c.open = false;
            self.unsubscribe(c.key);
        }
    }

    fn flush(&self) -> usize {
        let connection = self.connection.lock();
        let flushed = connection.as_ref().map_or(0, |c| c.rx.try_iter().count());
        flushed
    }
}

impl Drop for LoopbackInlet {
    fn drop(&mut self) {
        if let Some(c) = self.connection.get_mut().take().filter(|c| c.open) {
            self.unsubscribe(c.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{StreamKind, StreamSchema};

    fn descriptor(kind: StreamKind) -> StreamDescriptor {
        StreamSchema::of(kind).descriptor("SN", 0.0, false)
    }

    #[test]
    fn test_discover_and_withdraw() {
        let transport = LoopbackTransport::new();
        let outlet = transport.create_outlet(descriptor(StreamKind::TimeSync)).unwrap();
        assert_eq!(outlet.descriptor().hostname, "loopback");

        let found = transport
            .discover(&StreamFilter::Name("Tobii_time_sync".into()), Duration::ZERO)
            .unwrap();
        assert_eq!(found.len(), 1);

        drop(outlet);
        assert_eq!(transport.outlet_count(), 0);
        assert!(transport
            .discover(&StreamFilter::Any, Duration::from_millis(20))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_only_open_inlets_receive() {
        let transport = LoopbackTransport::new();
        let outlet = transport.create_outlet(descriptor(StreamKind::ExtSignal)).unwrap();
        let inlet = transport.open(outlet.descriptor()).unwrap();

        outlet.publish(SampleValues::Int64(vec![1, 2, 3, 0]), Some(2.0)).unwrap();
        assert!(!outlet.has_consumers());

        inlet.open_stream(Duration::ZERO).unwrap();
        assert!(outlet.has_consumers());
        outlet.publish(SampleValues::Int64(vec![4, 5, 6, 0]), Some(3.0)).unwrap();

        let pulled = inlet.pull(Duration::from_millis(100)).unwrap().unwrap();
        assert_eq!(pulled.timestamp, 3.0);
        assert_eq!(pulled.values, SampleValues::Int64(vec![4, 5, 6, 0]));
        assert!(inlet.pull(Duration::from_millis(10)).unwrap().is_none());
    }

    #[test]
    fn test_close_then_flush_discards_residue() {
        let transport = LoopbackTransport::new();
        let outlet = transport.create_outlet(descriptor(StreamKind::TimeSync)).unwrap();
        let inlet = transport.open(outlet.descriptor()).unwrap();
        inlet.open_stream(Duration::ZERO).unwrap();

        for t in 1..=3 {
            outlet.publish(SampleValues::Int64(vec![t, t, t]), None).unwrap();
        }
        inlet.close_stream();
        assert!(!outlet.has_consumers());
        assert_eq!(inlet.flush(), 3);
        assert_eq!(inlet.flush(), 0);
    }

    #[test]
    fn test_clock_offset_and_local_stamp() {
        let transport = LoopbackTransport::new();
        transport.set_clock_offset(0.25);
        let outlet = transport.create_outlet(descriptor(StreamKind::Positioning)).unwrap();
        let inlet = transport.open(outlet.descriptor()).unwrap();
        inlet.open_stream(Duration::ZERO).unwrap();
        assert_eq!(inlet.time_offset(Duration::ZERO).unwrap(), 0.25);

        let before = transport.local_clock();
        outlet.publish(SampleValues::Float32(vec![0.0; 8]), None).unwrap();
        let pulled = inlet.pull(Duration::from_millis(100)).unwrap().unwrap();
        assert!(pulled.timestamp >= before);
    }

    #[test]
    fn test_withdrawn_outlet_disconnects_inlet() {
        let transport = LoopbackTransport::new();
        let outlet = transport.create_outlet(descriptor(StreamKind::Gaze)).unwrap();
        let inlet = transport.open(outlet.descriptor()).unwrap();
        inlet.open_stream(Duration::ZERO).unwrap();

        drop(outlet);
        assert!(inlet.pull(Duration::from_millis(10)).is_err());
    }
}
