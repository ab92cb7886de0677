//! Stream Type Registry
//!
//! Static mapping from [`StreamKind`] to its wire shape. No runtime state.

use serde::Serialize;

use crate::{ChannelFormat, StreamDescriptor, StreamKind};

/// Channels per eye in a gaze sample.
pub const GAZE_CHANNELS_PER_EYE: usize = 21;

/// Wire shape of one stream kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamSchema {
    pub kind: StreamKind,
    pub type_tag: &'static str,
    pub channel_count: usize,
    pub channel_format: ChannelFormat,
    /// Whether the publisher stamps samples with a device-derived timestamp.
    /// When false the transport stamps them with its own clock.
    pub has_timestamp: bool,
    /// Default initial capacity of an inlet buffer for this kind.
    pub default_capacity: usize,
}

const GAZE: StreamSchema = StreamSchema {
    kind: StreamKind::Gaze,
    type_tag: "Gaze",
    channel_count: GAZE_CHANNELS_PER_EYE * 2 + 1,
    channel_format: ChannelFormat::Double64,
    has_timestamp: true,
    default_capacity: 1 << 20,
};

const EYE_IMAGE: StreamSchema = StreamSchema {
    kind: StreamKind::EyeImage,
    type_tag: "VideoRaw",
    channel_count: 0,
    channel_format: ChannelFormat::Undefined,
    has_timestamp: true,
    default_capacity: 1 << 12,
};

const EXT_SIGNAL: StreamSchema = StreamSchema {
    kind: StreamKind::ExtSignal,
    type_tag: "TTL",
    channel_count: 4,
    channel_format: ChannelFormat::Int64,
    has_timestamp: true,
    default_capacity: 1 << 10,
};

const TIME_SYNC: StreamSchema = StreamSchema {
    kind: StreamKind::TimeSync,
    type_tag: "TimeSync",
    channel_count: 3,
    channel_format: ChannelFormat::Int64,
    has_timestamp: true,
    default_capacity: 1 << 10,
};

const POSITIONING: StreamSchema = StreamSchema {
    kind: StreamKind::Positioning,
    type_tag: "Positioning",
    channel_count: 8,
    channel_format: ChannelFormat::Float32,
    has_timestamp: false,
    default_capacity: 1 << 12,
};

impl StreamSchema {
    pub const fn of(kind: StreamKind) -> &'static StreamSchema {
        match kind {
            StreamKind::Gaze => &GAZE,
            StreamKind::EyeImage => &EYE_IMAGE,
            StreamKind::ExtSignal => &EXT_SIGNAL,
            StreamKind::TimeSync => &TIME_SYNC,
            StreamKind::Positioning => &POSITIONING,
        }
    }

    /// Type tag to publish with. Eye images sent as GIF are compressed video.
    pub fn publish_type_tag(&self, as_gif: bool) -> &'static str {
        match self.kind {
            StreamKind::EyeImage if as_gif => "VideoCompressed",
            _ => self.type_tag,
        }
    }

    /// Descriptor to publish for device `serial`. `hostname` is left for the transport to fill.
    pub fn descriptor(&self, serial: &str, nominal_rate: f64, as_gif: bool) -> StreamDescriptor {
        StreamDescriptor {
            name: self.kind.stream_name(),
            type_tag: self.publish_type_tag(as_gif).to_string(),
            source_id: self.kind.source_id(serial),
            channel_count: self.channel_count,
            channel_format: self.channel_format,
            nominal_rate,
            hostname: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_consistent() {
        for kind in StreamKind::ALL {
            let schema = StreamSchema::of(kind);
            assert_eq!(schema.kind, kind);
            assert_eq!(StreamKind::from_type_tag(schema.type_tag), Some(kind));
            assert!(schema.default_capacity > 0);
        }
        assert_eq!(StreamSchema::of(StreamKind::Gaze).channel_count, 43);
    }

    #[test]
    fn test_gif_tag() {
        let schema = StreamSchema::of(StreamKind::EyeImage);
        assert_eq!(schema.publish_type_tag(false), "VideoRaw");
        assert_eq!(schema.publish_type_tag(true), "VideoCompressed");
        assert_eq!(
            StreamSchema::of(StreamKind::Gaze).publish_type_tag(true),
            "Gaze"
        );
    }

    #[test]
    fn test_descriptor_is_in_namespace() {
        let descriptor = StreamSchema::of(StreamKind::TimeSync).descriptor("SN1", 0.0, false);
        assert!(crate::is_own_source_id(&descriptor.source_id));
        assert_eq!(descriptor.kind(), Some(StreamKind::TimeSync));
        assert_eq!(descriptor.channel_count, 3);
    }
}
