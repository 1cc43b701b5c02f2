//! 重试执行器
//!
//! 按策略的最大尝试次数执行操作，失败后按 `base * 2^(n-1)` 毫秒指数退避。
//!
//! # 特性
//!
//! - **返回原始错误**: 重试耗尽后返回最后一次错误，不做包装
//! - **尝试记录**: 每次尝试都会上报给 [`AttemptObserver`]，上报失败只记录日志
//! - **可中断**: 退避等待期间响应 [`CancellationToken`]，并遵守调用方截止时间
//! - **无共享状态**: 执行器本身不持有可变状态

use crate::circuit::CircuitPolicy;
use crate::clock::{add_duration, Clock};
use crate::error::{GuardError, Interruption};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::Display;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// 调用上下文
///
/// 携带操作名、可选的取消令牌和截止时间。
#[derive(Debug, Clone)]
pub struct CallContext {
    operation: Cow<'static, str>,
    cancel: Option<CancellationToken>,
    deadline: Option<DateTime<Utc>>,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new("call")
    }
}

impl CallContext {
    pub fn new(operation: impl Into<Cow<'static, str>>) -> Self {
        Self {
            operation: operation.into(),
            cancel: None,
            deadline: None,
        }
    }

    /// 设置取消令牌
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 设置截止时间
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// 替换操作名，保留取消令牌和截止时间
    pub fn for_operation(&self, operation: impl Into<Cow<'static, str>>) -> Self {
        Self {
            operation: operation.into(),
            cancel: self.cancel.clone(),
            deadline: self.deadline,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    async fn cancelled(&self) {
        match &self.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }
}

/// 单次尝试记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub call_id: Uuid,
    pub service: String,
    pub operation: String,
    /// 从1开始
    pub attempt: u32,
    pub max_attempts: u32,
    pub duration: Duration,
    pub success: bool,
    pub error: Option<String>,
}

/// 尝试观察者
///
/// 实现不得阻塞；返回的错误会被记录后丢弃。
pub trait AttemptObserver: Send + Sync {
    fn on_attempt(&self, record: &AttemptRecord) -> Result<(), GuardError>;
}

/// 基于tracing的尝试日志
#[derive(Debug, Clone, Copy, Default)]
pub struct AttemptLogger;

impl AttemptObserver for AttemptLogger {
    fn on_attempt(&self, record: &AttemptRecord) -> Result<(), GuardError> {
        if record.success {
            debug!(
                call_id = %record.call_id,
                service = %record.service,
                operation = %record.operation,
                attempt = record.attempt,
                duration_ms = record.duration.as_millis() as u64,
                "调用成功"
            );
        } else {
            warn!(
                call_id = %record.call_id,
                service = %record.service,
                operation = %record.operation,
                attempt = record.attempt,
                max_attempts = record.max_attempts,
                duration_ms = record.duration.as_millis() as u64,
                error = record.error.as_deref().unwrap_or_default(),
                "调用失败"
            );
        }
        Ok(())
    }
}

/// 重试结果错误
#[derive(Debug)]
pub enum RetryError<E> {
    /// 尝试次数耗尽，携带最后一次错误
    Exhausted { attempts: u32, error: E },
    /// 被取消或超过截止时间
    Interrupted {
        /// 已完成的尝试次数
        attempts: u32,
        reason: Interruption,
        last_error: Option<E>,
    },
}

impl<E> RetryError<E> {
    /// 已完成的尝试次数
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Interrupted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// 重试执行器
#[derive(Clone)]
pub struct RetryExecutor {
    clock: Arc<dyn Clock>,
    observer: Arc<dyn AttemptObserver>,
}

impl RetryExecutor {
    pub fn new(clock: Arc<dyn Clock>, observer: Arc<dyn AttemptObserver>) -> Self {
        Self { clock, observer }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// 带重试执行操作
    ///
    /// # 参数
    /// - `service`: 服务名（用于记录）
    /// - `policy`: 熔断策略，提供尝试次数和退避基数
    /// - `ctx`: 调用上下文
    /// - `operation`: 每次尝试调用一次
    ///
    /// # 示例
    /// ```rust
    /// use svcguard::circuit::CircuitPolicy;
    /// use svcguard::clock::ManualClock;
    /// use svcguard::retry::{AttemptLogger, CallContext, RetryExecutor};
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let executor = RetryExecutor::new(Arc::new(ManualClock::new()), Arc::new(AttemptLogger));
    /// let policy = CircuitPolicy::new(5, 60, 3, 500);
    ///
    /// let result = executor
    ///     .run_with_retry("ledger", &policy, &CallContext::default(), || async {
    ///         Ok::<u32, std::io::Error>(7)
    ///     })
    ///     .await;
    /// assert_eq!(result.ok(), Some(7));
    /// # }
    /// ```
    pub async fn run_with_retry<T, E, F, Fut>(
        &self,
        service: &str,
        policy: &CircuitPolicy,
        ctx: &CallContext,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let call_id = Uuid::new_v4();
        let max_attempts = policy.retry_attempts.max(1);
        let mut last_error: Option<E> = None;

        for attempt in 1..=max_attempts {
            if ctx.is_cancelled() {
                return Err(self.interrupted(
                    service,
                    ctx,
                    attempt - 1,
                    Interruption::Cancelled,
                    last_error,
                ));
            }

            let started = Instant::now();
            let outcome = operation().await;
            let duration = started.elapsed();

            let error = match outcome {
                Ok(value) => {
                    self.observe(AttemptRecord {
                        call_id,
                        service: service.to_string(),
                        operation: ctx.operation().to_string(),
                        attempt,
                        max_attempts,
                        duration,
                        success: true,
                        error: None,
                    });
                    return Ok(value);
                }
                Err(e) => e,
            };

            self.observe(AttemptRecord {
                call_id,
                service: service.to_string(),
                operation: ctx.operation().to_string(),
                attempt,
                max_attempts,
                duration,
                success: false,
                error: Some(error.to_string()),
            });

            if attempt == max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    error,
                });
            }

            let delay = policy.retry_delay(attempt);
            if let Some(deadline) = ctx.deadline() {
                if add_duration(self.clock.now(), delay) >= deadline {
                    return Err(self.interrupted(
                        service,
                        ctx,
                        attempt,
                        Interruption::DeadlineExceeded,
                        Some(error),
                    ));
                }
            }

            debug!(
                service,
                operation = ctx.operation(),
                "操作失败，将在 {:?} 后重试 (尝试 {}/{})",
                delay,
                attempt,
                max_attempts
            );
            last_error = Some(error);

            tokio::select! {
                _ = self.clock.sleep(delay) => {}
                _ = ctx.cancelled() => {
                    return Err(self.interrupted(
                        service,
                        ctx,
                        attempt,
                        Interruption::Cancelled,
                        last_error,
                    ));
                }
            }
        }

        // max_attempts >= 1，循环总会返回
        Err(RetryError::Interrupted {
            attempts: max_attempts,
            reason: Interruption::Cancelled,
            last_error,
        })
    }

    fn interrupted<E>(
        &self,
        service: &str,
        ctx: &CallContext,
        attempts: u32,
        reason: Interruption,
        last_error: Option<E>,
    ) -> RetryError<E> {
        warn!(
            service,
            operation = ctx.operation(),
            attempts,
            %reason,
            "重试被中断"
        );
        RetryError::Interrupted {
            attempts,
            reason,
            last_error,
        }
    }

    fn observe(&self, record: AttemptRecord) {
        match catch_unwind(AssertUnwindSafe(|| self.observer.on_attempt(&record))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(service = %record.service, "尝试记录上报失败: {}", e),
            Err(_) => warn!(service = %record.service, "尝试记录上报发生panic"),
        }
    }
}
