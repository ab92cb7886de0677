//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{StreamKind, StreamSchema, StreamerConfig};
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

/// Info report for JSON output
#[derive(Serialize)]
struct InfoReport {
    streams: Vec<StreamInfo>,
    /// `None` when the built-in defaults are shown
    #[serde(skip_serializing_if = "Option::is_none")]
    config_path: Option<String>,
    config: StreamerConfig,
}

#[derive(Serialize)]
struct StreamInfo {
    #[serde(flatten)]
    schema: StreamSchema,
    stream_name: String,
    has_time_range: bool,
    configured_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let (config, config_path) = if args.config.exists() {
        let config = load_config(&args.config)?;
        (config, Some(args.config.display().to_string()))
    } else {
        info!(config = %args.config.display(), "Configuration file not found, showing defaults");
        (StreamerConfig::default(), None)
    };

    let report = build_report(config, config_path);

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize info report")?;
        println!("{}", json);
    } else {
        print_report(&report)?;
    }

    Ok(())
}

fn build_report(config: StreamerConfig, config_path: Option<String>) -> InfoReport {
    let streams = StreamKind::ALL
        .iter()
        .map(|&kind| StreamInfo {
            schema: *StreamSchema::of(kind),
            stream_name: kind.stream_name(),
            has_time_range: kind.has_time_range(),
            configured_capacity: config.inlet.capacity.for_kind(kind),
        })
        .collect();

    InfoReport {
        streams,
        config_path,
        config,
    }
}

fn print_report(report: &InfoReport) -> Result<()> {
    println!("\n=== Stream Types ===\n");
    println!(
        "{:<12} {:<12} {:>8} {:<10} {:<10} {:>10}",
        "kind", "type", "channels", "format", "timestamp", "capacity"
    );
    for stream in &report.streams {
        let schema = &stream.schema;
        println!(
            "{:<12} {:<12} {:>8} {:<10} {:<10} {:>10}",
            schema.kind.as_str(),
            schema.type_tag,
            schema.channel_count,
            format!("{:?}", schema.channel_format),
            if schema.has_timestamp { "device" } else { "transport" },
            stream.configured_capacity
        );
    }

    match report.config_path {
        Some(ref path) => println!("\n=== Configuration ({}) ===\n", path),
        None => println!("\n=== Configuration (defaults) ===\n"),
    }
    let toml = config_loader::ConfigLoader::to_toml(&report.config)
        .context("Failed to render configuration")?;
    println!("{}", toml);

    Ok(())
}
