//! # Streamer
//!
//! Top-level coordinating object: bridges one eye tracker to the broadcast
//! network (outlets) and buffers streams received from it (inlets).
//!
//! ## Usage Example
//!
//! ```ignore
//! use streamer::Streamer;
//! use contracts::{ExtSignalRecord, StreamKind};
//!
//! let streamer = Streamer::new(transport, config);
//! streamer.connect(device)?;
//! streamer.start_outlet(StreamKind::ExtSignal, None)?;
//!
//! let id = streamer
//!     .inlets()
//!     .create_listener_for_source(&StreamKind::ExtSignal.source_id(serial), None, Some(true))?;
//! let signals: Vec<ExtSignalRecord> = streamer.inlets().consume_n(id, None, None)?;
//! ```

mod error;
mod streamer;

pub use error::{Result, StreamerError};
pub use streamer::Streamer;
