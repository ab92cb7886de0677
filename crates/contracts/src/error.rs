//! Layered error definitions
//!
//! Categorized by source: config / transport / device / decode

use thiserror::Error;

use crate::{ChannelFormat, StreamKind};

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Collaborator Errors =====
    /// Broadcast transport returned a non-success status
    #[error("transport error during {operation}: {message}")]
    Transport { operation: String, message: String },

    /// Eye tracker returned a non-success status
    #[error("device error during {operation}: {message}")]
    Device { operation: String, message: String },

    // ===== Decode Errors =====
    /// Payload does not have the shape registered for its stream kind
    #[error("cannot decode {kind} sample: expected {expected}, got {actual}")]
    Decode {
        kind: StreamKind,
        expected: String,
        actual: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create device error
    pub fn device(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Device {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Payload had the wrong numeric encoding or channel count
    pub fn decode_shape(
        kind: StreamKind,
        expected: (ChannelFormat, usize),
        actual: (ChannelFormat, usize),
    ) -> Self {
        Self::Decode {
            kind,
            expected: format!("{} x {}", expected.1, expected.0),
            actual: format!("{} x {}", actual.1, actual.0),
        }
    }
}
