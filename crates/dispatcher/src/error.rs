//! Dispatcher error types

use contracts::ContractError;
use thiserror::Error;

/// Outlet-side errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// The device lacks a capability the request needs
    #[error("the eye tracker does not provide {capability}")]
    CapabilityMissing { capability: &'static str },

    /// Device clock and transport clock disagree
    #[error(
        "device and transport clocks differ by {mean_offset_s:.6} s on average \
         (tolerance {tolerance_s} s)"
    )]
    ClockMismatch { mean_offset_s: f64, tolerance_s: f64 },

    /// Transport or device failure
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl DispatcherError {
    /// Create a capability error
    pub fn capability_missing(capability: &'static str) -> Self {
        Self::CapabilityMissing { capability }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, DispatcherError>;
