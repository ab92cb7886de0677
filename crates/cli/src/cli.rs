//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::StreamKind;
use std::path::PathBuf;

/// Gaze Streamer - eye-tracker stream publishing, buffering and merging
#[derive(Parser, Debug)]
#[command(
    name = "gaze-streamer",
    author,
    version,
    about = "Eye-tracker stream buffering and merge engine",
    long_about = "Publishes eye-tracker measurements as broadcast streams and buffers \n\
                  streams received from the network for time-windowed consumption.\n\n\
                  The `run` command drives a simulated eye tracker over an in-process \n\
                  loopback network."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "GAZE_STREAMER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "GAZE_STREAMER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulated eye tracker and subscribe to its streams
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the stream type table and effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "streamer.toml",
        env = "GAZE_STREAMER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the outlet streams from configuration (comma separated)
    #[arg(long, value_delimiter = ',', env = "GAZE_STREAMER_STREAMS")]
    pub streams: Option<Vec<StreamKind>>,

    /// Publish gaze and eye openness as separate samples
    #[arg(long)]
    pub no_merge: bool,

    /// Serial number of the simulated eye tracker
    #[arg(long, default_value = "MOCK-0001", env = "GAZE_STREAMER_SERIAL")]
    pub serial: String,

    /// Gaze sampling frequency of the simulated eye tracker
    #[arg(long, default_value = "120", env = "GAZE_STREAMER_FREQUENCY")]
    pub frequency: f64,

    /// Run duration in seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0", env = "GAZE_STREAMER_DURATION")]
    pub duration: u64,

    /// Interval between inlet buffer drains, milliseconds
    #[arg(long, default_value = "500")]
    pub drain_interval_ms: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "GAZE_STREAMER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "streamer.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults are shown when it is absent
    #[arg(short, long, default_value = "streamer.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
