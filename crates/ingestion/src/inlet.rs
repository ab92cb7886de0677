//! Kind-tagged inlet storage.
//!
//! [`InletBuffer`] is a sum type over one [`SampleBuffer`] per stream kind.
//! The registry only ever talks to it through the kind-agnostic methods
//! below; typed access goes through [`BufferedRecord::select`].

use contracts::{
    ContractError, EyeImageRecord, ExtSignalRecord, GazeRecord, PositioningRecord, SampleValues,
    StreamKind, StreamRecord, TimeRange, TimeSyncRecord,
};

use crate::{Result, SampleBuffer};

#[derive(Debug)]
pub enum InletBuffer {
    Gaze(SampleBuffer<GazeRecord>),
    EyeImage(SampleBuffer<EyeImageRecord>),
    ExtSignal(SampleBuffer<ExtSignalRecord>),
    TimeSync(SampleBuffer<TimeSyncRecord>),
    Positioning(SampleBuffer<PositioningRecord>),
}

macro_rules! dispatch {
    ($self:expr, $buffer:ident => $body:expr) => {
        match $self {
            InletBuffer::Gaze($buffer) => $body,
            InletBuffer::EyeImage($buffer) => $body,
            InletBuffer::ExtSignal($buffer) => $body,
            InletBuffer::TimeSync($buffer) => $body,
            InletBuffer::Positioning($buffer) => $body,
        }
    };
}

/// Decode and append, generic over the record type.
fn append_decoded<R: StreamRecord>(
    buffer: &SampleBuffer<R>,
    values: &SampleValues,
    remote_time: i64,
    local_time: i64,
) -> std::result::Result<(), ContractError> {
    let record = R::decode(values, remote_time, local_time)?;
    buffer.push(record);
    Ok(())
}

impl InletBuffer {
    pub fn new(kind: StreamKind, capacity: usize) -> Self {
        match kind {
            StreamKind::Gaze => InletBuffer::Gaze(SampleBuffer::with_capacity(capacity)),
            StreamKind::EyeImage => InletBuffer::EyeImage(SampleBuffer::with_capacity(capacity)),
            StreamKind::ExtSignal => InletBuffer::ExtSignal(SampleBuffer::with_capacity(capacity)),
            StreamKind::TimeSync => InletBuffer::TimeSync(SampleBuffer::with_capacity(capacity)),
            StreamKind::Positioning => {
                InletBuffer::Positioning(SampleBuffer::with_capacity(capacity))
            }
        }
    }

    pub fn kind(&self) -> StreamKind {
        match self {
            InletBuffer::Gaze(_) => StreamKind::Gaze,
            InletBuffer::EyeImage(_) => StreamKind::EyeImage,
            InletBuffer::ExtSignal(_) => StreamKind::ExtSignal,
            InletBuffer::TimeSync(_) => StreamKind::TimeSync,
            InletBuffer::Positioning(_) => StreamKind::Positioning,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, b => b.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode a pulled payload into this buffer's record type and append it.
    pub fn append(
        &self,
        values: &SampleValues,
        remote_time: i64,
        local_time: i64,
    ) -> std::result::Result<(), ContractError> {
        dispatch!(self, b => append_decoded(b, values, remote_time, local_time))
    }

    /// Discard everything. Returns the number of discarded records.
    pub fn clear(&self) -> usize {
        dispatch!(self, b => b.clear())
    }

    /// Fails with `UnsupportedOperation` for positioning buffers.
    pub fn clear_time_range(&self, range: TimeRange) -> Result<usize> {
        dispatch!(self, b => b.clear_time_range(range))
    }
}

/// Record types that have a slot in [`InletBuffer`].
pub trait BufferedRecord: StreamRecord {
    /// `None` when `buffer` holds a different kind.
    fn select(buffer: &InletBuffer) -> Option<&SampleBuffer<Self>>;
}

macro_rules! buffered_record {
    ($record:ty, $variant:ident) => {
        impl BufferedRecord for $record {
            fn select(buffer: &InletBuffer) -> Option<&SampleBuffer<Self>> {
                match buffer {
                    InletBuffer::$variant(b) => Some(b),
                    _ => None,
                }
            }
        }
    };
}

buffered_record!(GazeRecord, Gaze);
buffered_record!(EyeImageRecord, EyeImage);
buffered_record!(ExtSignalRecord, ExtSignal);
buffered_record!(TimeSyncRecord, TimeSync);
buffered_record!(PositioningRecord, Positioning);

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Publishable, TimeSync};

    #[test]
    fn test_kind_matches_constructor() {
        for kind in StreamKind::ALL {
            let buffer = InletBuffer::new(kind, 8);
            assert_eq!(buffer.kind(), kind);
            assert!(buffer.is_empty());
        }
    }

    #[test]
    fn test_append_decodes_into_kind() {
        let buffer = InletBuffer::new(StreamKind::TimeSync, 8);
        let sync = TimeSync {
            system_request_time_stamp: 1,
            device_time_stamp: 2,
            system_response_time_stamp: 3,
        };
        buffer.append(&sync.encode(), 1, 11).unwrap();
        assert_eq!(buffer.len(), 1);

        let typed = TimeSyncRecord::select(&buffer).unwrap();
        let records = typed.peek_n(contracts::CountQuery::peek(None, None));
        assert_eq!(records[0].time_sync, sync);
        assert_eq!(records[0].local_time, 11);
    }

    #[test]
    fn test_append_rejects_foreign_payload() {
        let buffer = InletBuffer::new(StreamKind::Gaze, 8);
        assert!(buffer.append(&SampleValues::Int64(vec![1, 2, 3]), 0, 0).is_err());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_select_rejects_other_kinds() {
        let buffer = InletBuffer::new(StreamKind::ExtSignal, 8);
        assert!(ExtSignalRecord::select(&buffer).is_some());
        assert!(GazeRecord::select(&buffer).is_none());
        assert!(PositioningRecord::select(&buffer).is_none());
    }
}
