//! Ingestion 错误类型

use contracts::{ContractError, StreamKind};
use thiserror::Error;

use crate::SubscriptionId;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 未知的入口 ID
    #[error("inlet {id} not found")]
    InletNotFound {
        /// 入口 ID
        id: SubscriptionId,
    },

    /// 按 source id 未找到流
    #[error("no stream with source id '{source_id}' found")]
    StreamNotFound {
        /// 请求的 source id
        source_id: String,
    },

    /// 按 source id 找到多个流
    #[error("{count} streams match source id '{source_id}', expected exactly one")]
    Ambiguous {
        /// 请求的 source id
        source_id: String,
        /// 匹配数量
        count: usize,
    },

    /// 流不属于本系统的发布命名空间
    #[error("stream '{name}' (source id '{source_id}') was not published by this streamer")]
    ForeignStream {
        /// 流名称
        name: String,
        /// 流 source id
        source_id: String,
    },

    /// 流类型标签无法识别
    #[error("stream '{name}' has unknown type '{type_tag}'")]
    UnknownType {
        /// 流名称
        name: String,
        /// 声明的类型标签
        type_tag: String,
    },

    /// 请求的记录类型与入口的流类型不一致 (调用方错误)
    #[error("inlet {id} holds {actual} records, but {expected} records were requested")]
    TypeMismatch {
        /// 入口 ID
        id: SubscriptionId,
        /// 调用方请求的类型
        expected: StreamKind,
        /// 入口实际类型
        actual: StreamKind,
    },

    /// 该流类型不支持此操作
    #[error("{operation} is not supported for {kind} streams")]
    UnsupportedOperation {
        /// 操作名
        operation: &'static str,
        /// 流类型
        kind: StreamKind,
    },

    /// 参数非法
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// 错误消息
        message: String,
    },

    /// 传输层失败
    #[error(transparent)]
    Transport(#[from] ContractError),
}

impl IngestionError {
    /// Unknown id or unresolved source.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IngestionError::InletNotFound { .. } | IngestionError::StreamNotFound { .. }
        )
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
