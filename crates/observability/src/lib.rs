//! # Observability
//!
//! 日志订阅器、Prometheus 导出器，以及入口/出口的 tracing span。
//!
//! 引擎各 crate 的 target 使用配置的级别，其余依赖只输出 warn；
//! 设置了 `RUST_LOG` 时以它为准。

pub mod metrics;

use anyhow::{Context, Result};
use contracts::StreamKind;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info_span, Level, Span};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub use crate::metrics::{
    record_buffer_depth, record_clock_offset, record_merge_emitted, record_publish_failure,
    record_pull_error, record_sample_ingested, record_sample_published, record_staging_depth,
    record_staging_flush, InletMetricsAggregator, MetricsSummary, RunningStats, StatsSummary,
    StreamStats, StreamSummary,
};

/// Log targets of the workspace crates, `gaze_streamer` being the binary.
pub const ENGINE_TARGETS: &[&str] = &[
    "gaze_streamer",
    "contracts",
    "config_loader",
    "loopback",
    "ingestion",
    "sync_engine",
    "dispatcher",
    "streamer",
    "observability",
];

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// 引擎 target 的日志级别
    pub level: Level,
    /// Prometheus 端口 (None = 禁用)
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            level: Level::INFO,
            metrics_port: None,
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

/// `warn` for everything, `level` for [`ENGINE_TARGETS`].
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(ENGINE_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

fn env_filter(level: Level) -> Result<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("invalid {}: {directives}", EnvFilter::DEFAULT_ENV)),
        _ => EnvFilter::try_new(default_directives(level))
            .context("invalid default log directives"),
    }
}

/// Worker threads are named `inlet-<id>-<kind>`, so every format keeps thread names.
fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_thread_names(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_thread_names(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_thread_names(true).boxed(),
    }
}

/// 安装全局订阅器，按需启动 Prometheus 导出器
pub fn init(config: ObservabilityConfig) -> Result<()> {
    let filter = env_filter(config.level)?;
    tracing_subscriber::registry()
        .with(fmt_layer(config.log_format))
        .with(filter)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    if let Some(port) = config.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .with_context(|| format!("cannot serve metrics on port {port}"))?;
        tracing::info!(port, "serving Prometheus metrics");
    }

    tracing::debug!(
        log_format = ?config.log_format,
        level = %config.level,
        "observability ready"
    );
    Ok(())
}

/// Span entered by an inlet's ingestion thread for its whole life.
pub fn inlet_span(inlet_id: u32, kind: StreamKind) -> Span {
    info_span!("inlet", inlet_id, kind = %kind)
}

/// Span around publishes on one outlet.
pub fn outlet_span(kind: StreamKind, source_id: &str) -> Span {
    info_span!("outlet", kind = %kind, source_id)
}
