//! Command implementations.

mod info;
mod run;
mod validate;

use std::path::Path;

use contracts::StreamerConfig;
use tracing::info;

use crate::error::{CliError, Result};

pub use info::run_info;
pub use run::run_streamer;
pub use validate::run_validate;

/// Load and validate the configuration at `path`.
fn load_config(path: &Path) -> Result<StreamerConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path));
    }
    info!(config = %path.display(), "Loading configuration");
    config_loader::ConfigLoader::load_from_path(path).map_err(|e| CliError::config_load(path, e))
}
