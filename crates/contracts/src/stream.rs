//! Stream kinds and the naming scheme of published streams.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Prefix of every source id published by this system.
pub const SOURCE_ID_PREFIX: &str = "LSL_streamer:Tobii_";

/// Prefix of every stream name published by this system.
pub const STREAM_NAME_PREFIX: &str = "Tobii_";

/// Semantic category of a stream.
///
/// `Gaze` always carries eye openness fields; whether they are filled
/// depends on the outlet's merge setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Gaze,
    EyeImage,
    ExtSignal,
    TimeSync,
    Positioning,
}

impl StreamKind {
    pub const ALL: [StreamKind; 5] = [
        StreamKind::Gaze,
        StreamKind::EyeImage,
        StreamKind::ExtSignal,
        StreamKind::TimeSync,
        StreamKind::Positioning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Gaze => "gaze",
            StreamKind::EyeImage => "eye_image",
            StreamKind::ExtSignal => "ext_signal",
            StreamKind::TimeSync => "time_sync",
            StreamKind::Positioning => "positioning",
        }
    }

    /// Whether records of this kind carry time fields usable for range queries.
    pub fn has_time_range(&self) -> bool {
        !matches!(self, StreamKind::Positioning)
    }

    /// Stream name used when publishing, e.g. `Tobii_gaze`.
    pub fn stream_name(&self) -> String {
        format!("{STREAM_NAME_PREFIX}{}", self.as_str())
    }

    /// Source id used when publishing on behalf of device `serial`.
    pub fn source_id(&self, serial: &str) -> String {
        format!("LSL_streamer:{}@{serial}", self.stream_name())
    }

    /// Classify a declared type tag. Both eye image tags map to `EyeImage`.
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "Gaze" => Some(StreamKind::Gaze),
            "VideoRaw" | "VideoCompressed" => Some(StreamKind::EyeImage),
            "TTL" => Some(StreamKind::ExtSignal),
            "TimeSync" => Some(StreamKind::TimeSync),
            "Positioning" => Some(StreamKind::Positioning),
            _ => None,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamKind {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let kind = match normalized.as_str() {
            "gaze" => StreamKind::Gaze,
            "eye_image" | "eyeimage" => StreamKind::EyeImage,
            "ext_signal" | "extsignal" => StreamKind::ExtSignal,
            "time_sync" | "timesync" => StreamKind::TimeSync,
            "positioning" => StreamKind::Positioning,
            _ => {
                return Err(ContractError::config_validation(
                    "stream",
                    format!("unknown stream kind '{s}'"),
                ))
            }
        };
        Ok(kind)
    }
}

/// Whether `source_id` was published by this system.
pub fn is_own_source_id(source_id: &str) -> bool {
    source_id.starts_with(SOURCE_ID_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(StreamKind::Gaze.stream_name(), "Tobii_gaze");
        assert_eq!(
            StreamKind::ExtSignal.source_id("TX300-01"),
            "LSL_streamer:Tobii_ext_signal@TX300-01"
        );
        assert!(is_own_source_id(&StreamKind::TimeSync.source_id("x")));
        assert!(!is_own_source_id("OpenBCI:eeg@1"));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Gaze".parse::<StreamKind>().unwrap(), StreamKind::Gaze);
        assert_eq!("eye-image".parse::<StreamKind>().unwrap(), StreamKind::EyeImage);
        assert_eq!("timeSync".parse::<StreamKind>().unwrap(), StreamKind::TimeSync);
        assert!("notes".parse::<StreamKind>().is_err());
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(StreamKind::from_type_tag("VideoCompressed"), Some(StreamKind::EyeImage));
        assert_eq!(StreamKind::from_type_tag("TTL"), Some(StreamKind::ExtSignal));
        assert_eq!(StreamKind::from_type_tag("EEG"), None);
        assert!(!StreamKind::Positioning.has_time_range());
    }
}
