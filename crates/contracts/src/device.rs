//! Eye tracker collaborator
//!
//! The device delivers partial measurements through callbacks registered per
//! measurement kind. Gaze and eye openness arrive independently and share the
//! device timestamp domain.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{ContractError, EyeData, EyeImage, EyeOpenness, ExtSignal, Positioning, StreamKind, TimeSync};

/// Static facts about a connected eye tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub serial_number: String,
    pub model: String,
    pub address: String,
    /// Gaze output frequency, Hz
    pub frequency: f64,
    pub has_eye_openness: bool,
}

/// Gaze partial: everything except eye openness.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GazeData {
    /// Eye openness fields are ignored.
    pub left: EyeData,
    pub right: EyeData,
    pub device_time_stamp: i64,
    pub system_time_stamp: i64,
}

/// Eye openness partial.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EyeOpennessData {
    pub left: EyeOpenness,
    pub right: EyeOpenness,
    pub device_time_stamp: i64,
    pub system_time_stamp: i64,
}

/// Measurement kinds a device can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStream {
    Gaze,
    EyeOpenness,
    EyeImage { as_gif: bool },
    ExtSignal,
    TimeSync,
    Positioning,
}

impl DeviceStream {
    /// Stream kind published for this measurement. Eye openness feeds the gaze stream.
    pub fn stream_kind(&self) -> StreamKind {
        match self {
            DeviceStream::Gaze | DeviceStream::EyeOpenness => StreamKind::Gaze,
            DeviceStream::EyeImage { .. } => StreamKind::EyeImage,
            DeviceStream::ExtSignal => StreamKind::ExtSignal,
            DeviceStream::TimeSync => StreamKind::TimeSync,
            DeviceStream::Positioning => StreamKind::Positioning,
        }
    }
}

impl fmt::Display for DeviceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStream::Gaze => f.write_str("gaze"),
            DeviceStream::EyeOpenness => f.write_str("eye_openness"),
            DeviceStream::EyeImage { as_gif: true } => f.write_str("eye_image(gif)"),
            DeviceStream::EyeImage { as_gif: false } => f.write_str("eye_image"),
            DeviceStream::ExtSignal => f.write_str("ext_signal"),
            DeviceStream::TimeSync => f.write_str("time_sync"),
            DeviceStream::Positioning => f.write_str("positioning"),
        }
    }
}

/// One device notification.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Gaze(GazeData),
    EyeOpenness(EyeOpennessData),
    EyeImage(EyeImage),
    ExtSignal(ExtSignal),
    TimeSync(TimeSync),
    Positioning(Positioning),
}

/// Callback invoked on the device's delivery thread.
pub type DeviceCallback = Arc<dyn Fn(DeviceEvent) + Send + Sync>;

/// Eye tracker.
pub trait Device: Send + Sync {
    fn info(&self) -> &DeviceInfo;

    /// Start delivering `stream` to `callback`.
    fn subscribe(&self, stream: DeviceStream, callback: DeviceCallback) -> Result<(), ContractError>;

    /// Stop delivering `stream`. Unsubscribing an inactive stream is not an error.
    fn unsubscribe(&self, stream: DeviceStream) -> Result<(), ContractError>;

    /// System clock used for `system_time_stamp` fields, µs.
    fn system_time_stamp(&self) -> i64;
}
