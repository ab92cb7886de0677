//! # Ingestion
//!
//! Inlet side of the streamer.
//!
//! Responsibilities:
//! - Subscribe to streams published by this system and classify them by kind
//! - Run one ingestion thread per active subscription
//! - Buffer decoded records in arrival order, with remote and local time fields
//! - Serve consume / peek / clear queries by count or by time range
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::InletRegistry;
//! use contracts::{GazeRecord, StreamKind};
//!
//! let registry = InletRegistry::new(transport, config.inlet, config.discovery.timeout());
//!
//! let stream = &registry.remote_streams(Some(StreamKind::Gaze))?[0];
//! let id = registry.create_listener(stream, None, Some(true))?;
//!
//! // later: everything that arrived so far, oldest first
//! let records: Vec<GazeRecord> = registry.consume_n(id, None, None)?;
//! ```

mod buffer;
mod error;
mod inlet;
mod registry;
mod stats;
mod worker;

// Re-exports
pub use buffer::SampleBuffer;
pub use error::{IngestionError, Result};
pub use inlet::{BufferedRecord, InletBuffer};
pub use registry::{InletRegistry, SubscriptionId};
pub use stats::{InletStats, InletStatsSnapshot};
