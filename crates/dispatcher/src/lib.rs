//! # Dispatcher
//!
//! 出口 (outlet) 管理模块。
//!
//! 负责：
//! - 按流类型创建/撤销出口，订阅/退订设备对应的测量
//! - 设备回调分发：注视点与睁眼度经合并缓冲后发布
//! - 连接时的设备时钟与传输时钟一致性检查

pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;

pub use clock::{check_clocks, mean_clock_offset};
pub use dispatcher::Dispatcher;
pub use error::{DispatcherError, Result};
pub use handle::OutletHandle;
pub use metrics::{OutletMetrics, OutletMetricsSnapshot};
