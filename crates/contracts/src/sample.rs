//! Opaque numeric payloads as carried by the broadcast transport.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Numeric encoding of a stream's channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelFormat {
    Float32,
    Double64,
    Int64,
    /// No numeric channels; the sample is an opaque blob.
    Undefined,
}

impl fmt::Display for ChannelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelFormat::Float32 => "float32",
            ChannelFormat::Double64 => "double64",
            ChannelFormat::Int64 => "int64",
            ChannelFormat::Undefined => "undefined",
        };
        f.write_str(s)
    }
}

/// One sample's channel values.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValues {
    Float32(Vec<f32>),
    Double64(Vec<f64>),
    Int64(Vec<i64>),
    Blob(Bytes),
}

impl SampleValues {
    pub fn format(&self) -> ChannelFormat {
        match self {
            SampleValues::Float32(_) => ChannelFormat::Float32,
            SampleValues::Double64(_) => ChannelFormat::Double64,
            SampleValues::Int64(_) => ChannelFormat::Int64,
            SampleValues::Blob(_) => ChannelFormat::Undefined,
        }
    }

    /// Number of numeric channels (0 for blobs).
    pub fn channel_count(&self) -> usize {
        match self {
            SampleValues::Float32(v) => v.len(),
            SampleValues::Double64(v) => v.len(),
            SampleValues::Int64(v) => v.len(),
            SampleValues::Blob(_) => 0,
        }
    }
}

/// A sample as returned by a transport pull.
#[derive(Debug, Clone, PartialEq)]
pub struct PulledSample {
    pub values: SampleValues,
    /// Remote (publisher clock) timestamp in seconds.
    pub timestamp: f64,
}
