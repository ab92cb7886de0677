//! Streamer configuration contracts shared across crates.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::{StreamKind, StreamSchema};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct StreamerConfig {
    /// Outlet (publishing) side
    #[serde(default)]
    #[validate(nested)]
    pub outlet: OutletConfig,

    /// Inlet (subscribing) side
    #[serde(default)]
    #[validate(nested)]
    pub inlet: InletConfig,

    /// Stream discovery
    #[serde(default)]
    #[validate(nested)]
    pub discovery: DiscoveryConfig,

    /// Startup clock agreement check
    #[serde(default)]
    #[validate(nested)]
    pub clock_check: ClockCheckConfig,
}

/// Outlet configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OutletConfig {
    /// Streams to publish at startup
    pub streams: Vec<StreamKind>,

    /// Merge eye openness into the gaze stream (only honoured when the device supports it)
    pub merge_openness_into_gaze: bool,

    /// Publish eye images as GIF
    pub eye_image_as_gif: bool,
}

impl Default for OutletConfig {
    fn default() -> Self {
        Self {
            streams: Vec::new(),
            merge_openness_into_gaze: true,
            eye_image_as_gif: false,
        }
    }
}

/// Inlet configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct InletConfig {
    /// Pull timeout of the ingestion loop, also its stop-flag polling interval
    #[validate(range(min = 1, max = 10_000))]
    pub pull_timeout_ms: u64,

    /// Timeout for opening a stream before the first pull
    #[validate(range(min = 0.001, max = 600.0))]
    pub open_timeout_s: f64,

    /// Timeout of the one-shot clock offset probe at subscribe time
    #[validate(range(min = 0.001, max = 600.0))]
    pub time_correction_timeout_s: f64,

    /// Start ingestion as soon as a listener is created
    pub start_on_create: bool,

    /// Initial buffer capacity per stream kind
    #[validate(nested)]
    pub capacity: CapacityConfig,
}

impl Default for InletConfig {
    fn default() -> Self {
        Self {
            pull_timeout_ms: 100,
            open_timeout_s: 5.0,
            time_correction_timeout_s: 5.0,
            start_on_create: false,
            capacity: CapacityConfig::default(),
        }
    }
}

impl InletConfig {
    pub fn pull_timeout(&self) -> Duration {
        Duration::from_millis(self.pull_timeout_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.open_timeout_s)
    }

    pub fn time_correction_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.time_correction_timeout_s)
    }
}

/// Initial inlet buffer capacity per stream kind
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CapacityConfig {
    #[validate(range(min = 1))]
    pub gaze: usize,
    #[validate(range(min = 1))]
    pub eye_image: usize,
    #[validate(range(min = 1))]
    pub ext_signal: usize,
    #[validate(range(min = 1))]
    pub time_sync: usize,
    #[validate(range(min = 1))]
    pub positioning: usize,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        let of = |kind| StreamSchema::of(kind).default_capacity;
        Self {
            gaze: of(StreamKind::Gaze),
            eye_image: of(StreamKind::EyeImage),
            ext_signal: of(StreamKind::ExtSignal),
            time_sync: of(StreamKind::TimeSync),
            positioning: of(StreamKind::Positioning),
        }
    }
}

impl CapacityConfig {
    pub fn for_kind(&self, kind: StreamKind) -> usize {
        match kind {
            StreamKind::Gaze => self.gaze,
            StreamKind::EyeImage => self.eye_image,
            StreamKind::ExtSignal => self.ext_signal,
            StreamKind::TimeSync => self.time_sync,
            StreamKind::Positioning => self.positioning,
        }
    }
}

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// How long to wait for streams to show up
    #[validate(range(min = 0.0, max = 600.0))]
    pub timeout_s: f64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { timeout_s: 2.0 }
    }
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_s)
    }
}

/// Clock agreement check between device and transport clocks
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClockCheckConfig {
    pub enabled: bool,

    /// Number of paired clock readings, split between both call orders
    #[validate(range(min = 1, max = 10_000))]
    pub samples: usize,

    /// Maximum tolerated mean offset, seconds
    #[validate(range(min = 0.0, max = 1.0))]
    pub tolerance_s: f64,
}

impl Default for ClockCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            samples: 20,
            tolerance_s: 0.001,
        }
    }
}
