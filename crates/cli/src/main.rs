//! # Gaze Streamer CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 模拟眼动仪 + 回环传输的演示运行
//! - 流类型表与有效配置查看

mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};

use cli::{Cli, Commands};
use commands::{run_info, run_streamer, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_observability(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Gaze Streamer CLI starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_streamer(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Tracing always; the Prometheus endpoint only for `run` with a nonzero port
fn init_observability(cli: &Cli) -> Result<()> {
    let level = if cli.quiet {
        Level::WARN
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let metrics_port = match &cli.command {
        Commands::Run(args) if args.metrics_port != 0 => Some(args.metrics_port),
        _ => None,
    };

    observability::init(observability::ObservabilityConfig {
        log_format: cli.log_format.into(),
        level,
        metrics_port,
    })
}
