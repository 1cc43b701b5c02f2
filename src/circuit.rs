//! 熔断器状态机
//!
//! 单个服务的熔断状态：三状态转换、计数器和时间戳。
//!
//! # 特性
//!
//! - **三状态**: Closed（关闭）、Open（打开）、HalfOpen（半开）
//! - **按调用计数**: 一次调用（包括其内部的全部重试）只记一次成功或失败
//! - **单探针**: 半开状态只放行一个探测调用，探测成功立即恢复
//! - **显式时间**: 所有方法接收 `now`，状态机本身不读取时钟
//!
//! 本模块不加锁，由 [`crate::registry::CircuitRegistry`] 为每个服务持有一把互斥锁。

use crate::clock::add_duration;
use crate::constants::{
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_HALF_OPEN_AFTER_SECS, DEFAULT_RETRY_AFTER_SECS,
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS, MAX_HALF_OPEN_AFTER_SECS,
    MAX_RETRY_ATTEMPTS,
};
use crate::error::GuardError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{info, trace, warn};

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitPhase {
    /// 关闭状态（正常）
    Closed,
    /// 打开状态（熔断）
    Open,
    /// 半开状态（探测）
    HalfOpen,
}

impl CircuitPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitPhase::Closed => "closed",
            CircuitPhase::Open => "open",
            CircuitPhase::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 熔断策略
///
/// 启动时为每个服务确定，运行期间不可修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitPolicy {
    /// 连续失败多少次后熔断
    pub failure_threshold: u64,
    /// 打开后多少秒允许半开探测
    pub half_open_after_secs: u64,
    /// 每次调用最多尝试次数（含首次）
    pub retry_attempts: u32,
    /// 指数退避的基础延迟（毫秒）
    pub retry_base_delay_ms: u64,
    /// 覆盖对外暴露的 Retry-After 提示
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl Default for CircuitPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            half_open_after_secs: DEFAULT_HALF_OPEN_AFTER_SECS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_after_secs: None,
        }
    }
}

impl CircuitPolicy {
    /// 创建新的熔断策略
    ///
    /// # 示例
    /// ```rust
    /// use svcguard::circuit::CircuitPolicy;
    ///
    /// let policy = CircuitPolicy::new(5, 60, 3, 500);
    /// assert_eq!(policy.retry_delay(2).as_millis(), 1000);
    /// ```
    pub fn new(
        failure_threshold: u64,
        half_open_after_secs: u64,
        retry_attempts: u32,
        retry_base_delay_ms: u64,
    ) -> Self {
        Self {
            failure_threshold,
            half_open_after_secs,
            retry_attempts,
            retry_base_delay_ms,
            retry_after_secs: None,
        }
    }

    /// 设置 Retry-After 提示
    pub fn retry_after_secs(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }

    /// 冷却时长
    pub fn half_open_after(&self) -> Duration {
        Duration::from_secs(self.half_open_after_secs)
    }

    /// 第 `attempt` 次失败后的退避时长（attempt 从1开始）
    ///
    /// `base * 2^(attempt-1)`，溢出时饱和。
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }

    /// 熔断打开时携带的 Retry-After 秒数
    pub fn effective_retry_after_secs(&self) -> u64 {
        match self.retry_after_secs {
            Some(secs) => secs,
            None if self.half_open_after_secs == 0 => DEFAULT_RETRY_AFTER_SECS,
            None => self.half_open_after_secs,
        }
    }

    /// 校验策略
    pub fn validate(&self) -> Result<(), GuardError> {
        if self.failure_threshold == 0 {
            return Err(GuardError::ConfigError(
                "failure_threshold 必须大于0".to_string(),
            ));
        }

        if self.retry_attempts == 0 || self.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(GuardError::ConfigError(format!(
                "retry_attempts 必须在 1..={} 之间: {}",
                MAX_RETRY_ATTEMPTS, self.retry_attempts
            )));
        }

        if self.half_open_after_secs > MAX_HALF_OPEN_AFTER_SECS {
            return Err(GuardError::ConfigError(format!(
                "half_open_after_secs 不能超过 {}: {}",
                MAX_HALF_OPEN_AFTER_SECS, self.half_open_after_secs
            )));
        }

        Ok(())
    }
}

/// 状态变更事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub service: String,
    pub from: CircuitPhase,
    pub to: CircuitPhase,
    pub at: DateTime<Utc>,
}

/// 准入结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// 放行
    Allowed {
        /// 是否为半开探针
        probe: bool,
        /// 放行时发生的状态变更（Open -> HalfOpen）
        transition: Option<TransitionEvent>,
    },
    /// 拒绝
    Rejected { retry_after_secs: u64 },
}

/// 对外暴露的简要状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitStatus {
    pub phase: CircuitPhase,
    pub last_transition_at: DateTime<Utc>,
    /// 连续失败次数
    pub failure_count: u64,
    /// 累计成功次数
    pub success_count: u64,
}

/// 熔断器统计信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub service: String,
    pub phase: CircuitPhase,
    pub consecutive_failures: u64,
    pub consecutive_successes: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_calls: u64,
    pub rejected_calls: u64,
    pub last_transition_at: DateTime<Utc>,
    pub opened_until: Option<DateTime<Utc>>,
    pub policy: CircuitPolicy,
}

/// 单个服务的熔断状态
#[derive(Debug, Clone)]
pub struct CircuitState {
    service_name: String,
    phase: CircuitPhase,
    consecutive_failures: u64,
    consecutive_successes: u64,
    total_successes: u64,
    total_failures: u64,
    total_calls: u64,
    rejected_calls: u64,
    last_transition_at: DateTime<Utc>,
    opened_until: Option<DateTime<Utc>>,
    probe_in_flight: bool,
}

impl CircuitState {
    pub fn new(service_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            service_name: service_name.into(),
            phase: CircuitPhase::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            total_successes: 0,
            total_failures: 0,
            total_calls: 0,
            rejected_calls: 0,
            last_transition_at: now,
            opened_until: None,
            probe_in_flight: false,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn phase(&self) -> CircuitPhase {
        self.phase
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures
    }

    pub fn consecutive_successes(&self) -> u64 {
        self.consecutive_successes
    }

    pub fn total_successes(&self) -> u64 {
        self.total_successes
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    pub fn last_transition_at(&self) -> DateTime<Utc> {
        self.last_transition_at
    }

    pub fn opened_until(&self) -> Option<DateTime<Utc>> {
        self.opened_until
    }

    /// 判断调用是否可以执行
    ///
    /// 打开且未过冷却期时拒绝；过了冷却期切换到半开并放行一个探针。
    pub fn try_acquire(&mut self, now: DateTime<Utc>, policy: &CircuitPolicy) -> Admission {
        match self.phase {
            CircuitPhase::Closed => {
                self.total_calls += 1;
                Admission::Allowed {
                    probe: false,
                    transition: None,
                }
            }
            CircuitPhase::Open => {
                let cooled_down = self.opened_until.map_or(true, |until| now >= until);
                if !cooled_down {
                    self.rejected_calls += 1;
                    trace!(service = %self.service_name, "熔断器打开，拒绝请求");
                    return Admission::Rejected {
                        retry_after_secs: policy.effective_retry_after_secs(),
                    };
                }

                let transition = self.transition(CircuitPhase::HalfOpen, now);
                self.probe_in_flight = true;
                self.total_calls += 1;
                Admission::Allowed {
                    probe: true,
                    transition: Some(transition),
                }
            }
            CircuitPhase::HalfOpen => {
                if self.probe_in_flight {
                    self.rejected_calls += 1;
                    trace!(service = %self.service_name, "半开探测进行中，拒绝请求");
                    return Admission::Rejected {
                        retry_after_secs: policy.effective_retry_after_secs(),
                    };
                }
                self.probe_in_flight = true;
                self.total_calls += 1;
                Admission::Allowed {
                    probe: true,
                    transition: None,
                }
            }
        }
    }

    /// 调用成功
    pub fn on_success(&mut self, now: DateTime<Utc>, probe: bool) -> Option<TransitionEvent> {
        self.total_successes += 1;
        self.consecutive_successes += 1;

        match self.phase {
            CircuitPhase::Closed => {
                self.consecutive_failures = 0;
                trace!(service = %self.service_name, "操作成功（关闭状态）");
                None
            }
            CircuitPhase::HalfOpen if probe => {
                self.probe_in_flight = false;
                self.consecutive_failures = 0;
                Some(self.transition(CircuitPhase::Closed, now))
            }
            phase => {
                trace!(service = %self.service_name, ?phase, "迟到的成功结果，仅计数");
                None
            }
        }
    }

    /// 调用失败
    pub fn on_failure(
        &mut self,
        now: DateTime<Utc>,
        policy: &CircuitPolicy,
        probe: bool,
    ) -> Option<TransitionEvent> {
        self.total_failures += 1;
        self.consecutive_successes = 0;

        match self.phase {
            CircuitPhase::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= policy.failure_threshold {
                    Some(self.open(now, policy))
                } else {
                    trace!(
                        service = %self.service_name,
                        "操作失败（关闭状态）: {}/{}",
                        self.consecutive_failures,
                        policy.failure_threshold
                    );
                    None
                }
            }
            CircuitPhase::HalfOpen if probe => {
                self.probe_in_flight = false;
                self.consecutive_failures += 1;
                Some(self.open(now, policy))
            }
            phase => {
                trace!(service = %self.service_name, ?phase, "迟到的失败结果，仅计数");
                None
            }
        }
    }

    /// 探针没有产生任何结果（尝试前即被取消）
    pub fn release_probe(&mut self, probe: bool) {
        if probe && self.phase == CircuitPhase::HalfOpen {
            self.probe_in_flight = false;
        }
    }

    /// 重置到关闭状态
    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<TransitionEvent> {
        let from = self.phase;
        let service_name = std::mem::take(&mut self.service_name);
        *self = Self::new(service_name, now);
        info!(service = %self.service_name, "重置熔断器");

        (from != CircuitPhase::Closed).then(|| TransitionEvent {
            service: self.service_name.clone(),
            from,
            to: CircuitPhase::Closed,
            at: now,
        })
    }

    pub fn status(&self) -> CircuitStatus {
        CircuitStatus {
            phase: self.phase,
            last_transition_at: self.last_transition_at,
            failure_count: self.consecutive_failures,
            success_count: self.total_successes,
        }
    }

    pub fn snapshot(&self, policy: &CircuitPolicy) -> CircuitSnapshot {
        CircuitSnapshot {
            service: self.service_name.clone(),
            phase: self.phase,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            total_successes: self.total_successes,
            total_failures: self.total_failures,
            total_calls: self.total_calls,
            rejected_calls: self.rejected_calls,
            last_transition_at: self.last_transition_at,
            opened_until: self.opened_until,
            policy: policy.clone(),
        }
    }

    fn open(&mut self, now: DateTime<Utc>, policy: &CircuitPolicy) -> TransitionEvent {
        let event = self.transition(CircuitPhase::Open, now);
        self.opened_until = Some(add_duration(now, policy.half_open_after()));
        warn!(
            service = %self.service_name,
            "熔断器状态变更: {} -> Open (failure_count={})",
            event.from,
            self.consecutive_failures
        );
        event
    }

    fn transition(&mut self, to: CircuitPhase, now: DateTime<Utc>) -> TransitionEvent {
        let from = self.phase;
        self.phase = to;
        self.last_transition_at = now;
        if to != CircuitPhase::Open {
            self.opened_until = None;
            info!(service = %self.service_name, "熔断器状态变更: {} -> {}", from, to);
        }

        TransitionEvent {
            service: self.service_name.clone(),
            from,
            to,
            at: now,
        }
    }
}
