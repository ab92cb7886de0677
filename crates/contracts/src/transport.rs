//! Broadcast transport collaborator
//!
//! The engine never speaks a wire protocol itself: it publishes through
//! [`OutletChannel`]s and pulls through [`InletHandle`]s obtained from a
//! [`Transport`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ChannelFormat, ContractError, PulledSample, SampleValues, StreamKind};

/// Description of a stream as advertised on the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: String,
    pub type_tag: String,
    pub source_id: String,
    pub channel_count: usize,
    pub channel_format: ChannelFormat,
    /// Hz; 0 means irregular.
    pub nominal_rate: f64,
    pub hostname: String,
}

impl StreamDescriptor {
    pub fn kind(&self) -> Option<StreamKind> {
        StreamKind::from_type_tag(&self.type_tag)
    }
}

/// Discovery predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFilter {
    Any,
    Name(String),
    SourceId(String),
}

impl StreamFilter {
    pub fn matches(&self, descriptor: &StreamDescriptor) -> bool {
        match self {
            StreamFilter::Any => true,
            StreamFilter::Name(name) => descriptor.name == *name,
            StreamFilter::SourceId(id) => descriptor.source_id == *id,
        }
    }
}

/// Publish handle for one stream. Dropping it withdraws the stream.
pub trait OutletChannel: Send + Sync {
    fn descriptor(&self) -> &StreamDescriptor;

    /// Publish one sample. `timestamp` in seconds on the transport clock;
    /// `None` stamps it with the transport's local clock.
    fn publish(&self, values: SampleValues, timestamp: Option<f64>) -> Result<(), ContractError>;

    /// Whether any inlet is currently connected.
    fn has_consumers(&self) -> bool;
}

/// Subscription handle for one remote stream.
///
/// Shared between the registry (open/close/flush) and an ingestion worker
/// (pull/time_offset), hence `&self` everywhere.
pub trait InletHandle: Send + Sync {
    fn descriptor(&self) -> &StreamDescriptor;

    fn open_stream(&self, timeout: Duration) -> Result<(), ContractError>;

    /// Block for at most `timeout`. `Ok(None)` on timeout or when no data is available.
    fn pull(&self, timeout: Duration) -> Result<Option<PulledSample>, ContractError>;

    /// Offset in seconds to add to a remote timestamp to express it on the local clock.
    fn time_offset(&self, timeout: Duration) -> Result<f64, ContractError>;

    fn close_stream(&self);

    /// Drop anything buffered on the transport side; returns the number of dropped samples.
    fn flush(&self) -> usize;
}

/// Broadcast network.
pub trait Transport: Send + Sync {
    fn create_outlet(
        &self,
        descriptor: StreamDescriptor,
    ) -> Result<Box<dyn OutletChannel>, ContractError>;

    fn discover(
        &self,
        filter: &StreamFilter,
        timeout: Duration,
    ) -> Result<Vec<StreamDescriptor>, ContractError>;

    fn open(&self, descriptor: &StreamDescriptor) -> Result<Arc<dyn InletHandle>, ContractError>;

    /// Transport clock in seconds.
    fn local_clock(&self) -> f64;
}
