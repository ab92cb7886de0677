//! # Loopback
//!
//! In-process stand-ins for the two external collaborators.
//!
//! Responsibilities:
//! - `LoopbackTransport`: broadcast transport with discovery, outlets and
//!   pull-based inlets, all inside one process
//! - `MockDevice`: synthetic eye tracker delivering gaze, eye openness and
//!   auxiliary streams on generator threads, or manually for tests
//! - A shared clock so device system timestamps and transport timestamps agree

pub mod clock;
pub mod device;
pub mod transport;
pub mod wire;

pub use device::{MockDevice, MockDeviceConfig};
pub use transport::{LoopbackInlet, LoopbackOutlet, LoopbackTransport};
