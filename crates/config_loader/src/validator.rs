//! 配置校验模块
//!
//! 校验规则：
//! - 字段取值范围 (由 `validator` derive 声明)
//! - outlet.streams 不重复
//! - pull_timeout 不超过 open_timeout
//! - 启用时钟校验时 tolerance_s > 0

use std::collections::HashSet;

use ::validator::Validate;
use contracts::{ContractError, StreamerConfig};

/// 校验 StreamerConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &StreamerConfig) -> Result<(), ContractError> {
    validate_ranges(config)?;
    validate_outlet_streams(config)?;
    validate_inlet_timeouts(config)?;
    validate_clock_check(config)?;
    Ok(())
}

/// 校验字段范围
fn validate_ranges(config: &StreamerConfig) -> Result<(), ContractError> {
    config
        .validate()
        .map_err(|e| ContractError::config_validation("config", e.to_string()))
}

/// 校验 outlet.streams 唯一性
fn validate_outlet_streams(config: &StreamerConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for kind in &config.outlet.streams {
        if !seen.insert(kind) {
            return Err(ContractError::config_validation(
                format!("outlet.streams[{kind}]"),
                "duplicate stream",
            ));
        }
    }
    Ok(())
}

/// 校验 inlet 超时关系
fn validate_inlet_timeouts(config: &StreamerConfig) -> Result<(), ContractError> {
    let inlet = &config.inlet;
    if inlet.pull_timeout() > inlet.open_timeout() {
        return Err(ContractError::config_validation(
            "inlet.pull_timeout_ms / inlet.open_timeout_s",
            format!(
                "pull_timeout_ms ({}) must not exceed open_timeout_s ({})",
                inlet.pull_timeout_ms, inlet.open_timeout_s
            ),
        ));
    }
    Ok(())
}

/// 校验时钟一致性检查配置
fn validate_clock_check(config: &StreamerConfig) -> Result<(), ContractError> {
    let check = &config.clock_check;
    if check.enabled && check.tolerance_s <= 0.0 {
        return Err(ContractError::config_validation(
            "clock_check.tolerance_s",
            format!(
                "tolerance_s must be > 0 when the check is enabled, got {}",
                check.tolerance_s
            ),
        ));
    }
    Ok(())
}
