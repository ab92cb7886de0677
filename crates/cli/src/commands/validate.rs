//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{StreamKind, StreamerConfig};
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    outlet_streams: Vec<StreamKind>,
    merge_openness_into_gaze: bool,
    pull_timeout_ms: u64,
    start_on_create: bool,
    discovery_timeout_s: f64,
    clock_check: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_config(&args.config) {
        Ok(config) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&config),
            summary: Some(ConfigSummary {
                outlet_streams: config.outlet.streams.clone(),
                merge_openness_into_gaze: config.outlet.merge_openness_into_gaze,
                pull_timeout_ms: config.inlet.pull_timeout_ms,
                start_on_create: config.inlet.start_on_create,
                discovery_timeout_s: config.discovery.timeout_s,
                clock_check: config.clock_check.enabled,
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            // include the cause chain, the top-level message only names the file
            error: Some(format!("{:#}", anyhow::Error::from(e))),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &StreamerConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.outlet.streams.is_empty() {
        warnings.push("outlet.streams is empty - nothing is published at startup".to_string());
    }

    if config.outlet.merge_openness_into_gaze && !config.outlet.streams.contains(&StreamKind::Gaze)
    {
        warnings.push(
            "outlet.merge_openness_into_gaze has no effect unless the gaze stream is published"
                .to_string(),
        );
    }

    if config.outlet.eye_image_as_gif && !config.outlet.streams.contains(&StreamKind::EyeImage) {
        warnings.push("outlet.eye_image_as_gif is set but eye_image is not published".to_string());
    }

    if config.discovery.timeout_s == 0.0 {
        warnings.push("discovery.timeout_s is 0 - only already-visible streams are found".to_string());
    }

    if !config.clock_check.enabled {
        warnings.push(
            "clock_check is disabled - device and transport clocks are not compared".to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            let streams: Vec<&str> = summary.outlet_streams.iter().map(|k| k.as_str()).collect();
            println!("\n  Outlet streams: [{}]", streams.join(", "));
            println!("  Merge openness into gaze: {}", summary.merge_openness_into_gaze);
            println!("  Pull timeout: {} ms", summary.pull_timeout_ms);
            println!("  Start on create: {}", summary.start_on_create);
            println!("  Discovery timeout: {} s", summary.discovery_timeout_s);
            println!("  Clock check: {}", summary.clock_check);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
