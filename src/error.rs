//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 错误类型定义
//!
//! 使用thiserror定义所有错误类型。
//!
//! - [`GuardError`]: 配置、注册、上报等非调用路径的错误
//! - [`CallError`]: 注册表 `execute` 返回的错误，原始操作错误原样保留
//! - [`ServiceUnavailableError`]: 熔断打开时对外暴露的唯一错误契约（503 + Retry-After）
//! - [`ServiceError`]: 服务包装层返回的错误

use crate::constants::{
    STATUS_BAD_GATEWAY, STATUS_GATEWAY_TIMEOUT, STATUS_INTERNAL_ERROR, STATUS_SERVICE_UNAVAILABLE,
};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// SvcGuard 错误类型
#[derive(Error, Debug)]
pub enum GuardError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 服务未注册
    #[error("服务未注册: {0}")]
    UnknownService(String),

    /// 状态上报错误
    #[error("状态上报错误: {0}")]
    ReportError(String),

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// YAML解析错误
    #[error("YAML解析错误: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML解析错误
    #[error("TOML解析错误: {0}")]
    TomlError(#[from] toml::de::Error),

    /// 指标错误
    #[cfg(feature = "monitoring")]
    #[error("指标错误: {0}")]
    MetricsError(#[from] prometheus::Error),
}

/// 重试被中断的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Interruption {
    /// 调用方取消
    Cancelled,
    /// 下一次重试会超过调用方的截止时间
    DeadlineExceeded,
}

impl fmt::Display for Interruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interruption::Cancelled => f.write_str("cancelled"),
            Interruption::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// 注册表调用错误
///
/// `Operation` 携带被包装操作的原始错误，类型与内容都不做改动。
#[derive(Error, Debug)]
pub enum CallError<E> {
    /// 熔断器打开，操作未被调用
    #[error("熔断器打开: service={service}, retry_after={retry_after_secs}s")]
    CircuitOpen {
        service: String,
        retry_after_secs: u64,
    },

    /// 服务未注册（编程错误）
    #[error("服务未注册: {0}")]
    UnknownService(String),

    /// 重试过程被取消或超过截止时间
    #[error("调用被中断: service={service}, attempts={attempts}, reason={reason}")]
    Interrupted {
        service: String,
        attempts: u32,
        reason: Interruption,
    },

    /// 操作本身的错误
    #[error(transparent)]
    Operation(E),
}

impl<E> CallError<E> {
    /// 是否为熔断拒绝
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CallError::CircuitOpen { .. })
    }

    /// 取出操作错误
    pub fn into_operation(self) -> Option<E> {
        match self {
            CallError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// 服务不可用错误
///
/// 熔断打开时在包装层边界产生，映射为 HTTP 503 并携带 Retry-After 提示。
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[error("服务暂不可用: {service}, {retry_after_secs}秒后重试")]
pub struct ServiceUnavailableError {
    pub service: String,
    pub retry_after_secs: u64,
}

impl ServiceUnavailableError {
    pub fn new(service: impl Into<String>, retry_after_secs: u64) -> Self {
        Self {
            service: service.into(),
            retry_after_secs,
        }
    }

    /// HTTP 状态码
    pub fn status_code(&self) -> u16 {
        STATUS_SERVICE_UNAVAILABLE
    }

    /// 重试等待时间
    pub fn retry_after(&self) -> Duration {
        Duration::from_secs(self.retry_after_secs)
    }
}

/// 服务包装层错误
#[derive(Error, Debug)]
pub enum ServiceError<E> {
    /// 熔断器打开
    #[error(transparent)]
    Unavailable(#[from] ServiceUnavailableError),

    /// 调用被中断
    #[error("调用被中断: service={service}, attempts={attempts}, reason={reason}")]
    Interrupted {
        service: String,
        attempts: u32,
        reason: Interruption,
    },

    /// 服务未注册
    #[error("服务未注册: {0}")]
    UnknownService(String),

    /// 下游服务的原始错误
    #[error(transparent)]
    Upstream(E),
}

impl<E> ServiceError<E> {
    /// 映射到 HTTP 状态码
    ///
    /// 已知不可用返回503，真实失败返回502，超时/取消返回504。
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Unavailable(e) => e.status_code(),
            ServiceError::Interrupted { .. } => STATUS_GATEWAY_TIMEOUT,
            ServiceError::UnknownService(_) => STATUS_INTERNAL_ERROR,
            ServiceError::Upstream(_) => STATUS_BAD_GATEWAY,
        }
    }

    /// Retry-After 提示，仅熔断打开时存在
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ServiceError::Unavailable(e) => Some(e.retry_after()),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }

    /// 取出下游原始错误
    pub fn into_upstream(self) -> Option<E> {
        match self {
            ServiceError::Upstream(e) => Some(e),
            _ => None,
        }
    }
}
