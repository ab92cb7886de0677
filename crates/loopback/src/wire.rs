//! Loopback wire format
//!
//! A frame is a fixed [`FrameHeader`] followed by the channel values cast to
//! bytes. Frames never leave the process, so native byte order is used.

use bytemuck::{Pod, Zeroable};
use bytes::{BufMut, Bytes, BytesMut};
use contracts::{ContractError, PulledSample, SampleValues};

const FORMAT_FLOAT32: u32 = 1;
const FORMAT_DOUBLE64: u32 = 2;
const FORMAT_INT64: u32 = 3;
const FORMAT_BLOB: u32 = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FrameHeader {
    format: u32,
    /// Channel count, or byte length for blobs
    len: u32,
    timestamp: f64,
}

const HEADER_LEN: usize = std::mem::size_of::<FrameHeader>();

/// Pack one sample into a frame.
pub fn encode(values: &SampleValues, timestamp: f64) -> Bytes {
    let (format, len, payload): (u32, usize, &[u8]) = match values {
        SampleValues::Float32(v) => (FORMAT_FLOAT32, v.len(), bytemuck::cast_slice(v)),
        SampleValues::Double64(v) => (FORMAT_DOUBLE64, v.len(), bytemuck::cast_slice(v)),
        SampleValues::Int64(v) => (FORMAT_INT64, v.len(), bytemuck::cast_slice(v)),
        SampleValues::Blob(b) => (FORMAT_BLOB, b.len(), b.as_ref()),
    };
    let header = FrameHeader {
        format,
        len: len as u32,
        timestamp,
    };

    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_slice(bytemuck::bytes_of(&header));
    frame.put_slice(payload);
    frame.freeze()
}

/// Unpack a frame produced by [`encode`].
pub fn decode(frame: &Bytes) -> Result<PulledSample, ContractError> {
    if frame.len() < HEADER_LEN {
        return Err(malformed(format!("frame of {} bytes has no header", frame.len())));
    }
    let header: FrameHeader = bytemuck::pod_read_unaligned(&frame[..HEADER_LEN]);
    let payload = frame.slice(HEADER_LEN..);
    let len = header.len as usize;

    // payload is not guaranteed to be aligned for the channel type
    let values = match header.format {
        FORMAT_FLOAT32 => SampleValues::Float32(bytemuck::pod_collect_to_vec(checked(&payload, len, 4)?)),
        FORMAT_DOUBLE64 => SampleValues::Double64(bytemuck::pod_collect_to_vec(checked(&payload, len, 8)?)),
        FORMAT_INT64 => SampleValues::Int64(bytemuck::pod_collect_to_vec(checked(&payload, len, 8)?)),
        FORMAT_BLOB => {
            checked(&payload, len, 1)?;
            SampleValues::Blob(payload)
        }
        other => return Err(malformed(format!("unknown format code {other}"))),
    };

    Ok(PulledSample {
        values,
        timestamp: header.timestamp,
    })
}

fn checked(payload: &[u8], len: usize, width: usize) -> Result<&[u8], ContractError> {
    if payload.len() != len * width {
        return Err(malformed(format!(
            "header announces {len} x {width} bytes, payload has {}",
            payload.len()
        )));
    }
    Ok(payload)
}

fn malformed(message: String) -> ContractError {
    ContractError::transport("decode_frame", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_frame() {
        let values = SampleValues::Double64(vec![0.5, -1.25, 3.0]);
        let pulled = decode(&encode(&values, 12.5)).unwrap();
        assert_eq!(pulled.values, values);
        assert_eq!(pulled.timestamp, 12.5);
    }

    #[test]
    fn test_blob_frame_keeps_bytes() {
        let values = SampleValues::Blob(Bytes::from_static(b"GIF89a"));
        let pulled = decode(&encode(&values, 1.0)).unwrap();
        assert_eq!(pulled.values, values);
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let frame = encode(&SampleValues::Int64(vec![1, 2, 3]), 1.0);
        assert!(decode(&frame.slice(..frame.len() - 1)).is_err());
        assert!(decode(&frame.slice(..4)).is_err());
    }
}
