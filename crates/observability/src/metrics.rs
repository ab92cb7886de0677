//! Streamer 指标收集模块
//!
//! 出口 (outlet) / 入口 (inlet) 两侧的运行指标，以及供 CLI 汇总使用的聚合器。

use std::collections::BTreeMap;

use contracts::StreamKind;
use metrics::{counter, gauge, histogram};

/// 记录出口样本发布
pub fn record_sample_published(kind: StreamKind) {
    counter!(
        "gaze_streamer_samples_published_total",
        "stream" => kind.as_str()
    )
    .increment(1);
}

/// 记录出口发布失败
pub fn record_publish_failure(kind: StreamKind) {
    counter!(
        "gaze_streamer_publish_failures_total",
        "stream" => kind.as_str()
    )
    .increment(1);
}

/// 记录入口样本写入缓冲区
pub fn record_sample_ingested(kind: StreamKind) {
    counter!(
        "gaze_streamer_samples_ingested_total",
        "stream" => kind.as_str()
    )
    .increment(1);
}

/// 记录入口拉取/解码错误
pub fn record_pull_error(kind: StreamKind) {
    counter!(
        "gaze_streamer_pull_errors_total",
        "stream" => kind.as_str()
    )
    .increment(1);
}

/// 记录缓冲区深度
pub fn record_buffer_depth(inlet_id: u32, kind: StreamKind, depth: usize) {
    gauge!(
        "gaze_streamer_buffer_depth",
        "inlet_id" => inlet_id.to_string(),
        "stream" => kind.as_str()
    )
    .set(depth as f64);
}

/// 记录合并缓冲区的一次输出
///
/// `complete` 为注视点与睁眼度都齐全的样本数，`partial` 为只有其中一种的样本数。
pub fn record_merge_emitted(complete: usize, partial: usize) {
    if complete > 0 {
        counter!("gaze_streamer_merged_samples_total", "status" => "complete")
            .increment(complete as u64);
    }
    if partial > 0 {
        counter!("gaze_streamer_merged_samples_total", "status" => "partial")
            .increment(partial as u64);
    }
}

/// 记录合并关闭时暂存区的强制清空
pub fn record_staging_flush(count: usize) {
    counter!("gaze_streamer_staging_flushes_total").increment(1);
    histogram!("gaze_streamer_staging_flush_size").record(count as f64);
}

/// 记录暂存区深度
pub fn record_staging_depth(depth: usize) {
    gauge!("gaze_streamer_staging_depth").set(depth as f64);
}

/// 记录设备时钟与传输时钟的平均偏差 (秒)
pub fn record_clock_offset(offset_s: f64) {
    gauge!("gaze_streamer_clock_offset_ms").set(offset_s * 1000.0);
}

/// 入口指标聚合器
///
/// 在内存中聚合已消费记录的统计，便于输出摘要。
#[derive(Debug, Clone, Default)]
pub struct InletMetricsAggregator {
    /// 各流类型统计
    pub streams: BTreeMap<StreamKind, StreamStats>,
}

/// 单个流类型的统计
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    /// 记录总数
    pub records: u64,

    /// 相邻记录的远端时间间隔 (毫秒)
    pub interval_ms: RunningStats,

    /// 时钟校正量 local - remote (毫秒)
    pub correction_ms: RunningStats,

    last_remote_time: Option<i64>,
}

impl InletMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    ///
    /// 时间单位为微秒；无时间字段的流 (Positioning) 只计数。
    pub fn update(&mut self, kind: StreamKind, remote_time: Option<i64>, local_time: Option<i64>) {
        let stats = self.streams.entry(kind).or_default();
        stats.records += 1;

        if let Some(remote) = remote_time {
            if let Some(last) = stats.last_remote_time {
                stats.interval_ms.push((remote - last) as f64 / 1000.0);
            }
            stats.last_remote_time = Some(remote);

            if let Some(local) = local_time {
                stats.correction_ms.push((local - remote) as f64 / 1000.0);
            }
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_records: self.streams.values().map(|s| s.records).sum(),
            streams: self
                .streams
                .iter()
                .map(|(kind, stats)| {
                    (
                        *kind,
                        StreamSummary {
                            records: stats.records,
                            interval_ms: StatsSummary::from(&stats.interval_ms),
                            correction_ms: StatsSummary::from(&stats.correction_ms),
                        },
                    )
                })
                .collect(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_records: u64,
    pub streams: BTreeMap<StreamKind, StreamSummary>,
}

/// 单个流类型的摘要
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    pub records: u64,
    pub interval_ms: StatsSummary,
    pub correction_ms: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Inlet Metrics Summary ===")?;
        writeln!(f, "Total records: {}", self.total_records)?;

        for (kind, summary) in &self.streams {
            writeln!(f, "[{}] records: {}", kind, summary.records)?;
            writeln!(f, "  Interval (ms): {}", summary.interval_ms)?;
            writeln!(f, "  Clock correction (ms): {}", summary.correction_ms)?;
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
