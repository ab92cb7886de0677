//! Typed records
//!
//! Device-side sample types (what the eye tracker reports and outlets publish)
//! and the inlet-side records wrapping them with remote/local time fields.
//!
//! ## Time fields
//! - `remote_time`: sample timestamp as pulled from the transport (publisher clock), µs
//! - `local_time`: `remote_time` corrected by the inlet's clock offset, µs

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{ChannelFormat, ContractError, SampleValues, StreamKind, StreamSchema, TimeField};

/// Convert a transport timestamp in seconds to microseconds.
#[inline]
pub fn seconds_to_us(seconds: f64) -> i64 {
    (seconds * 1e6).round() as i64
}

/// Convert microseconds to a transport timestamp in seconds.
#[inline]
pub fn us_to_seconds(us: i64) -> f64 {
    us as f64 / 1e6
}

#[inline]
fn flag<T: From<u8>>(value: bool) -> T {
    T::from(value as u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

// ============================================================================
// Gaze
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GazePoint {
    pub on_display_area: Vec2,
    pub in_user_coordinates: Vec3,
    pub valid: bool,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PupilData {
    /// mm
    pub diameter: f32,
    pub valid: bool,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GazeOrigin {
    pub in_user_coordinates: Vec3,
    pub in_track_box_coordinates: Vec3,
    pub valid: bool,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyeOpenness {
    /// mm
    pub diameter: f32,
    pub valid: bool,
    pub available: bool,
}

/// Everything measured for one eye.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyeData {
    pub gaze_point: GazePoint,
    pub pupil: PupilData,
    pub gaze_origin: GazeOrigin,
    pub eye_openness: EyeOpenness,
}

impl EyeData {
    fn encode_into(&self, out: &mut Vec<f64>) {
        let gp = &self.gaze_point;
        out.extend_from_slice(&[
            gp.on_display_area.x as f64,
            gp.on_display_area.y as f64,
            gp.in_user_coordinates.x as f64,
            gp.in_user_coordinates.y as f64,
            gp.in_user_coordinates.z as f64,
            flag(gp.valid),
            flag(gp.available),
            self.pupil.diameter as f64,
            flag(self.pupil.valid),
            flag(self.pupil.available),
        ]);
        let go = &self.gaze_origin;
        out.extend_from_slice(&[
            go.in_user_coordinates.x as f64,
            go.in_user_coordinates.y as f64,
            go.in_user_coordinates.z as f64,
            go.in_track_box_coordinates.x as f64,
            go.in_track_box_coordinates.y as f64,
            go.in_track_box_coordinates.z as f64,
            flag(go.valid),
            flag(go.available),
            self.eye_openness.diameter as f64,
            flag(self.eye_openness.valid),
            flag(self.eye_openness.available),
        ]);
    }

    /// `ch` must hold exactly one eye's channels.
    fn decode(ch: &[f64]) -> Self {
        let f = |i: usize| ch[i] as f32;
        let b = |i: usize| ch[i] == 1.0;
        Self {
            gaze_point: GazePoint {
                on_display_area: Vec2 { x: f(0), y: f(1) },
                in_user_coordinates: Vec3::new(f(2), f(3), f(4)),
                valid: b(5),
                available: b(6),
            },
            pupil: PupilData {
                diameter: f(7),
                valid: b(8),
                available: b(9),
            },
            gaze_origin: GazeOrigin {
                in_user_coordinates: Vec3::new(f(10), f(11), f(12)),
                in_track_box_coordinates: Vec3::new(f(13), f(14), f(15)),
                valid: b(16),
                available: b(17),
            },
            eye_openness: EyeOpenness {
                diameter: f(18),
                valid: b(19),
                available: b(20),
            },
        }
    }
}

/// One merged gaze sample (gaze point, pupil, origin and eye openness).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GazeSample {
    pub left: EyeData,
    pub right: EyeData,
    /// Device clock, µs
    pub device_time_stamp: i64,
    /// System clock, µs
    pub system_time_stamp: i64,
}

// ============================================================================
// Other device samples
// ============================================================================

/// Eye image as delivered by the device; the payload is never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EyeImage {
    pub device_time_stamp: i64,
    pub system_time_stamp: i64,
    pub is_gif: bool,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtSignalChange {
    #[default]
    ValueChanged,
    InitialValue,
    ConnectionRestored,
}

impl ExtSignalChange {
    pub fn code(&self) -> i64 {
        match self {
            ExtSignalChange::ValueChanged => 0,
            ExtSignalChange::InitialValue => 1,
            ExtSignalChange::ConnectionRestored => 2,
        }
    }

    /// Unknown codes decode as `ConnectionRestored`.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ExtSignalChange::ValueChanged,
            1 => ExtSignalChange::InitialValue,
            _ => ExtSignalChange::ConnectionRestored,
        }
    }
}

/// TTL/external trigger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtSignal {
    pub device_time_stamp: i64,
    pub system_time_stamp: i64,
    pub value: u32,
    pub change_type: ExtSignalChange,
}

/// Clock synchronisation probe between system and device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeSync {
    pub system_request_time_stamp: i64,
    pub device_time_stamp: i64,
    pub system_response_time_stamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UserPosition {
    /// Normalised track box coordinates.
    pub position: Vec3,
    pub valid: bool,
}

/// User position guide. Carries no timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Positioning {
    pub left: UserPosition,
    pub right: UserPosition,
}

// ============================================================================
// Encoding (outlet side)
// ============================================================================

/// A device sample that can be published on an outlet.
pub trait Publishable {
    const KIND: StreamKind;

    fn encode(&self) -> SampleValues;

    /// Transport timestamp in seconds, `None` to let the transport stamp it.
    fn timestamp(&self) -> Option<f64>;
}

impl Publishable for GazeSample {
    const KIND: StreamKind = StreamKind::Gaze;

    fn encode(&self) -> SampleValues {
        let mut out = Vec::with_capacity(StreamSchema::of(Self::KIND).channel_count);
        self.left.encode_into(&mut out);
        self.right.encode_into(&mut out);
        out.push(us_to_seconds(self.device_time_stamp));
        SampleValues::Double64(out)
    }

    fn timestamp(&self) -> Option<f64> {
        Some(us_to_seconds(self.system_time_stamp))
    }
}

impl Publishable for EyeImage {
    const KIND: StreamKind = StreamKind::EyeImage;

    fn encode(&self) -> SampleValues {
        SampleValues::Blob(self.data.clone())
    }

    fn timestamp(&self) -> Option<f64> {
        Some(us_to_seconds(self.system_time_stamp))
    }
}

impl Publishable for ExtSignal {
    const KIND: StreamKind = StreamKind::ExtSignal;

    fn encode(&self) -> SampleValues {
        SampleValues::Int64(vec![
            self.device_time_stamp,
            self.system_time_stamp,
            self.value as i64,
            self.change_type.code(),
        ])
    }

    fn timestamp(&self) -> Option<f64> {
        Some(us_to_seconds(self.system_time_stamp))
    }
}

impl Publishable for TimeSync {
    const KIND: StreamKind = StreamKind::TimeSync;

    fn encode(&self) -> SampleValues {
        SampleValues::Int64(vec![
            self.system_request_time_stamp,
            self.device_time_stamp,
            self.system_response_time_stamp,
        ])
    }

    fn timestamp(&self) -> Option<f64> {
        Some(us_to_seconds(self.system_request_time_stamp))
    }
}

impl Publishable for Positioning {
    const KIND: StreamKind = StreamKind::Positioning;

    fn encode(&self) -> SampleValues {
        let eye = |p: &UserPosition| [p.position.x, p.position.y, p.position.z, flag(p.valid)];
        let mut out = Vec::with_capacity(8);
        out.extend_from_slice(&eye(&self.left));
        out.extend_from_slice(&eye(&self.right));
        SampleValues::Float32(out)
    }

    fn timestamp(&self) -> Option<f64> {
        None
    }
}

// ============================================================================
// Inlet records (decoding side)
// ============================================================================

/// A record stored in an inlet buffer.
pub trait StreamRecord: Clone + Send + Sync + 'static {
    const KIND: StreamKind;

    /// Decode a pulled payload. `remote_time`/`local_time` are µs.
    fn decode(values: &SampleValues, remote_time: i64, local_time: i64)
        -> Result<Self, ContractError>;

    /// Time field used by range queries; `None` for kinds without time semantics.
    fn time(&self, field: TimeField) -> Option<i64>;
}

macro_rules! expect_channels {
    ($kind:expr, $values:expr, $variant:ident, $format:expr) => {{
        let expected = StreamSchema::of($kind).channel_count;
        match $values {
            SampleValues::$variant(v) if v.len() == expected => v.as_slice(),
            other => {
                return Err(ContractError::decode_shape(
                    $kind,
                    ($format, expected),
                    (other.format(), other.channel_count()),
                ))
            }
        }
    }};
}

macro_rules! timed_record {
    ($record:ident, $field:ident: $ty:ty) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $record {
            pub $field: $ty,
            pub remote_time: i64,
            pub local_time: i64,
        }
    };
}

timed_record!(GazeRecord, gaze: GazeSample);
timed_record!(EyeImageRecord, image: Bytes);
timed_record!(ExtSignalRecord, signal: ExtSignal);
timed_record!(TimeSyncRecord, time_sync: TimeSync);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositioningRecord {
    pub positioning: Positioning,
}

#[inline]
fn pick(field: TimeField, remote_time: i64, local_time: i64) -> Option<i64> {
    Some(match field {
        TimeField::Local => local_time,
        TimeField::Remote => remote_time,
    })
}

impl StreamRecord for GazeRecord {
    const KIND: StreamKind = StreamKind::Gaze;

    fn decode(values: &SampleValues, remote_time: i64, local_time: i64) -> Result<Self, ContractError> {
        let ch = expect_channels!(Self::KIND, values, Double64, ChannelFormat::Double64);
        let (left, rest) = ch.split_at(crate::GAZE_CHANNELS_PER_EYE);
        let (right, rest) = rest.split_at(crate::GAZE_CHANNELS_PER_EYE);
        Ok(Self {
            gaze: GazeSample {
                left: EyeData::decode(left),
                right: EyeData::decode(right),
                device_time_stamp: seconds_to_us(rest[0]),
                // transmitted as the sample timestamp
                system_time_stamp: remote_time,
            },
            remote_time,
            local_time,
        })
    }

    fn time(&self, field: TimeField) -> Option<i64> {
        pick(field, self.remote_time, self.local_time)
    }
}

impl StreamRecord for EyeImageRecord {
    const KIND: StreamKind = StreamKind::EyeImage;

    fn decode(values: &SampleValues, remote_time: i64, local_time: i64) -> Result<Self, ContractError> {
        match values {
            SampleValues::Blob(image) => Ok(Self {
                image: image.clone(),
                remote_time,
                local_time,
            }),
            other => Err(ContractError::decode_shape(
                Self::KIND,
                (ChannelFormat::Undefined, 0),
                (other.format(), other.channel_count()),
            )),
        }
    }

    fn time(&self, field: TimeField) -> Option<i64> {
        pick(field, self.remote_time, self.local_time)
    }
}

impl StreamRecord for ExtSignalRecord {
    const KIND: StreamKind = StreamKind::ExtSignal;

    fn decode(values: &SampleValues, remote_time: i64, local_time: i64) -> Result<Self, ContractError> {
        let ch = expect_channels!(Self::KIND, values, Int64, ChannelFormat::Int64);
        Ok(Self {
            signal: ExtSignal {
                device_time_stamp: ch[0],
                system_time_stamp: ch[1],
                value: ch[2] as u32,
                change_type: ExtSignalChange::from_code(ch[3]),
            },
            remote_time,
            local_time,
        })
    }

    fn time(&self, field: TimeField) -> Option<i64> {
        pick(field, self.remote_time, self.local_time)
    }
}

impl StreamRecord for TimeSyncRecord {
    const KIND: StreamKind = StreamKind::TimeSync;

    fn decode(values: &SampleValues, remote_time: i64, local_time: i64) -> Result<Self, ContractError> {
        let ch = expect_channels!(Self::KIND, values, Int64, ChannelFormat::Int64);
        Ok(Self {
            time_sync: TimeSync {
                system_request_time_stamp: ch[0],
                device_time_stamp: ch[1],
                system_response_time_stamp: ch[2],
            },
            remote_time,
            local_time,
        })
    }

    fn time(&self, field: TimeField) -> Option<i64> {
        pick(field, self.remote_time, self.local_time)
    }
}

impl StreamRecord for PositioningRecord {
    const KIND: StreamKind = StreamKind::Positioning;

    fn decode(values: &SampleValues, _remote_time: i64, _local_time: i64) -> Result<Self, ContractError> {
        let ch = expect_channels!(Self::KIND, values, Float32, ChannelFormat::Float32);
        let eye = |c: &[f32]| UserPosition {
            position: Vec3::new(c[0], c[1], c[2]),
            valid: c[3] == 1.0,
        };
        Ok(Self {
            positioning: Positioning {
                left: eye(&ch[0..4]),
                right: eye(&ch[4..8]),
            },
        })
    }

    fn time(&self, _field: TimeField) -> Option<i64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eye(seed: f32, valid: bool) -> EyeData {
        EyeData {
            gaze_point: GazePoint {
                on_display_area: Vec2 { x: seed, y: seed + 0.25 },
                in_user_coordinates: Vec3::new(seed * 10.0, -seed, 600.5),
                valid,
                available: true,
            },
            pupil: PupilData {
                diameter: 3.5 + seed,
                valid: !valid,
                available: true,
            },
            gaze_origin: GazeOrigin {
                in_user_coordinates: Vec3::new(-30.0, 2.0, 650.0),
                in_track_box_coordinates: Vec3::new(0.4, 0.5, 0.6),
                valid,
                available: false,
            },
            eye_openness: EyeOpenness {
                diameter: 11.0,
                valid: true,
                available: valid,
            },
        }
    }

    #[test]
    fn test_gaze_round_trip() {
        let sample = GazeSample {
            left: eye(0.125, true),
            right: eye(0.75, false),
            device_time_stamp: 1_234_567_891,
            system_time_stamp: 98_765_432_101,
        };
        let values = sample.encode();
        assert_eq!(values.channel_count(), 43);

        let remote = seconds_to_us(sample.timestamp().unwrap());
        let record = GazeRecord::decode(&values, remote, remote + 40).unwrap();
        assert_eq!(record.gaze, sample);
        assert_eq!(record.time(TimeField::Local), Some(remote + 40));
        assert_eq!(record.time(TimeField::Remote), Some(remote));
    }

    #[test]
    fn test_ext_signal_round_trip() {
        for change_type in [
            ExtSignalChange::ValueChanged,
            ExtSignalChange::InitialValue,
            ExtSignalChange::ConnectionRestored,
        ] {
            let signal = ExtSignal {
                device_time_stamp: 10,
                system_time_stamp: 20,
                value: 255,
                change_type,
            };
            let record = ExtSignalRecord::decode(&signal.encode(), 20, 25).unwrap();
            assert_eq!(record.signal, signal);
        }
    }

    #[test]
    fn test_time_sync_round_trip() {
        let sync = TimeSync {
            system_request_time_stamp: 100,
            device_time_stamp: 150,
            system_response_time_stamp: 210,
        };
        assert_eq!(sync.timestamp(), Some(0.0001));
        let record = TimeSyncRecord::decode(&sync.encode(), 100, 100).unwrap();
        assert_eq!(record.time_sync, sync);
    }

    #[test]
    fn test_positioning_round_trip() {
        let positioning = Positioning {
            left: UserPosition {
                position: Vec3::new(0.3, 0.5, 0.45),
                valid: true,
            },
            right: UserPosition {
                position: Vec3::new(0.7, 0.5, 0.45),
                valid: false,
            },
        };
        assert_eq!(positioning.timestamp(), None);
        let record = PositioningRecord::decode(&positioning.encode(), 0, 0).unwrap();
        assert_eq!(record.positioning, positioning);
        assert_eq!(record.time(TimeField::Local), None);
    }

    #[test]
    fn test_eye_image_round_trip() {
        let image = EyeImage {
            device_time_stamp: 1,
            system_time_stamp: 2_000_000,
            is_gif: false,
            data: Bytes::from_static(&[0x47, 0x49, 0x46]),
        };
        let record = EyeImageRecord::decode(&image.encode(), 2_000_000, 2_000_010).unwrap();
        assert_eq!(record.image, image.data);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let err = GazeRecord::decode(&SampleValues::Double64(vec![0.0; 42]), 0, 0).unwrap_err();
        assert!(err.to_string().contains("43 x double64"));

        let err = ExtSignalRecord::decode(&SampleValues::Float32(vec![0.0; 4]), 0, 0).unwrap_err();
        assert!(matches!(err, ContractError::Decode { kind: StreamKind::ExtSignal, .. }));

        assert!(EyeImageRecord::decode(&SampleValues::Int64(vec![1]), 0, 0).is_err());
    }

    #[test]
    fn test_validity_decodes_by_equality() {
        let mut values = GazeSample::default().encode();
        if let SampleValues::Double64(ch) = &mut values {
            ch[5] = 0.999;
            ch[26] = 1.0;
        }
        let record = GazeRecord::decode(&values, 0, 0).unwrap();
        assert!(!record.gaze.left.gaze_point.valid);
        assert!(record.gaze.right.gaze_point.valid);
    }
}
