//! Streamer error types

use contracts::ContractError;
use dispatcher::DispatcherError;
use ingestion::IngestionError;
use thiserror::Error;

/// Top-level error
#[derive(Debug, Error)]
pub enum StreamerError {
    /// Outlet operation without a connected eye tracker
    #[error("not connected to an eye tracker, cannot {operation}")]
    NotConnected { operation: &'static str },

    /// `connect` called twice
    #[error("already connected to eye tracker '{serial_number}'")]
    AlreadyConnected { serial_number: String },

    /// Outlet side
    #[error(transparent)]
    Outlet(#[from] DispatcherError),

    /// Inlet side
    #[error(transparent)]
    Inlet(#[from] IngestionError),

    /// Transport or device
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Result alias
pub type Result<T> = std::result::Result<T, StreamerError>;
