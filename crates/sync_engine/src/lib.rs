//! # Sync Engine
//!
//! 出口侧注视数据合并引擎。
//!
//! 负责：
//! - 按设备时间戳合并注视点 (gaze) 与睁眼度 (eye openness) 两路部分数据
//! - 暂存尚未配齐的样本，按时间顺序输出
//! - 合并关闭时清空暂存区
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::{GazeMerger, GazePart};
//!
//! let merger = GazeMerger::new();
//!
//! // Push partials as they arrive
//! for merged in merger.push(GazePart::Gaze(data), true) {
//!     // Publish merged.sample
//! }
//! ```

mod staging;

pub use staging::{GazeMerger, GazePart, MergedGaze};
