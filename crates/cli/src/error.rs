//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be parsed or failed validation
    #[error("Failed to load configuration from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: contracts::ContractError,
    },
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn config_load(path: &Path, source: contracts::ContractError) -> Self {
        Self::ConfigLoad {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
