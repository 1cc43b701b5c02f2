//! 熔断器注册表
//!
//! 为每个外部服务持有一份 [`CircuitState`] 和 [`CircuitPolicy`]，
//! 通过 [`CircuitRegistry::execute`] 统一执行受保护的调用。
//!
//! # 并发模型
//!
//! - 服务表使用 `DashMap`，启动时注册，运行期间只读
//! - 每个服务一把 `parking_lot::Mutex`，不同服务之间互不竞争
//! - 准入判断和结果记录各自在一次加锁内完成，锁不会跨越 `.await`
//! - 状态变更事件在锁外上报

use crate::circuit::{
    Admission, CircuitPhase, CircuitPolicy, CircuitSnapshot, CircuitState, CircuitStatus,
    TransitionEvent,
};
use crate::clock::{Clock, SystemClock};
use crate::config::GuardConfig;
use crate::error::{CallError, GuardError};
use crate::reporter::{report_safely, LogReporter, TransitionReporter};
use crate::retry::{AttemptLogger, AttemptObserver, CallContext, RetryError, RetryExecutor};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use scopeguard::ScopeGuard;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 注册表中的单个服务
struct CircuitEntry {
    policy: CircuitPolicy,
    state: Mutex<CircuitState>,
}

/// 熔断器注册表
pub struct CircuitRegistry {
    entries: DashMap<String, Arc<CircuitEntry>, ahash::RandomState>,
    clock: Arc<dyn Clock>,
    executor: RetryExecutor,
    reporter: Arc<dyn TransitionReporter>,
}

/// 注册表构建器
pub struct CircuitRegistryBuilder {
    clock: Arc<dyn Clock>,
    observer: Arc<dyn AttemptObserver>,
    reporter: Arc<dyn TransitionReporter>,
}

impl Default for CircuitRegistryBuilder {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            observer: Arc::new(AttemptLogger),
            reporter: Arc::new(LogReporter),
        }
    }
}

impl CircuitRegistryBuilder {
    /// 设置时钟
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 设置尝试观察者
    pub fn observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// 设置状态变更上报器
    pub fn reporter(mut self, reporter: Arc<dyn TransitionReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// 构建空注册表
    pub fn build(self) -> CircuitRegistry {
        CircuitRegistry {
            entries: DashMap::with_hasher(ahash::RandomState::new()),
            executor: RetryExecutor::new(self.clock.clone(), self.observer),
            clock: self.clock,
            reporter: self.reporter,
        }
    }

    /// 构建注册表并注册配置中的所有服务
    pub fn build_from_config(self, config: &GuardConfig) -> Result<CircuitRegistry, GuardError> {
        config.validate()?;
        let registry = self.build();
        for (name, policy) in &config.services {
            registry.register(name.as_str(), policy.clone())?;
        }
        Ok(registry)
    }
}

impl Default for CircuitRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CircuitRegistry {
    pub fn builder() -> CircuitRegistryBuilder {
        CircuitRegistryBuilder::default()
    }

    /// 使用默认时钟和上报器，从配置创建注册表
    pub fn from_config(config: &GuardConfig) -> Result<Self, GuardError> {
        Self::builder().build_from_config(config)
    }

    /// 注册服务
    ///
    /// 幂等：同名服务重复注册时保留第一次的策略。
    pub fn register(
        &self,
        service: impl Into<String>,
        policy: CircuitPolicy,
    ) -> Result<(), GuardError> {
        let service = service.into();
        if service.is_empty() {
            return Err(GuardError::ConfigError("服务名不能为空".to_string()));
        }
        policy.validate().map_err(|e| match e {
            GuardError::ConfigError(msg) => {
                GuardError::ConfigError(format!("服务[{}]策略无效: {}", service, msg))
            }
            other => other,
        })?;

        match self.entries.entry(service) {
            Entry::Occupied(existing) => {
                if existing.get().policy != policy {
                    warn!(service = %existing.key(), "服务已注册，忽略不同的策略");
                } else {
                    debug!(service = %existing.key(), "服务已注册");
                }
            }
            Entry::Vacant(vacant) => {
                info!(
                    service = %vacant.key(),
                    "注册熔断器: failure_threshold={}, half_open_after={}s, retry_attempts={}, retry_base_delay={}ms",
                    policy.failure_threshold,
                    policy.half_open_after_secs,
                    policy.retry_attempts,
                    policy.retry_base_delay_ms
                );
                self.reporter.on_register(vacant.key());
                let state = CircuitState::new(vacant.key().clone(), self.clock.now());
                vacant.insert(Arc::new(CircuitEntry {
                    policy,
                    state: Mutex::new(state),
                }));
            }
        }
        Ok(())
    }

    /// 执行受保护的操作
    ///
    /// # 返回
    /// - `Ok(T)`: 操作成功
    /// - `Err(CallError::CircuitOpen)`: 熔断打开，操作未被调用
    /// - `Err(CallError::Operation)`: 重试耗尽后的原始错误
    ///
    /// # 示例
    /// ```rust
    /// use svcguard::circuit::CircuitPolicy;
    /// use svcguard::registry::CircuitRegistry;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let registry = CircuitRegistry::default();
    /// registry.register("ledger", CircuitPolicy::new(5, 60, 3, 500)).unwrap();
    ///
    /// let result = registry
    ///     .execute("ledger", || async { Ok::<_, std::io::Error>("0xabc") })
    ///     .await;
    /// assert_eq!(result.ok(), Some("0xabc"));
    /// # }
    /// ```
    pub async fn execute<T, E, F, Fut>(
        &self,
        service: &str,
        operation: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_with(service, &CallContext::default(), operation)
            .await
    }

    /// 带调用上下文执行受保护的操作
    pub async fn execute_with<T, E, F, Fut>(
        &self,
        service: &str,
        ctx: &CallContext,
        operation: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let entry = self
            .entry(service)
            .ok_or_else(|| CallError::UnknownService(service.to_string()))?;

        let admission = {
            let mut state = entry.state.lock();
            state.try_acquire(self.clock.now(), &entry.policy)
        };

        let probe = match admission {
            Admission::Rejected { retry_after_secs } => {
                return Err(CallError::CircuitOpen {
                    service: service.to_string(),
                    retry_after_secs,
                });
            }
            Admission::Allowed { probe, transition } => {
                self.emit(transition);
                probe
            }
        };

        // 调用方丢弃 future 时归还半开试探名额
        let pending = scopeguard::guard(Arc::clone(&entry), move |entry| {
            entry.state.lock().release_probe(probe);
            if probe {
                debug!(service = %service, "半开试探被丢弃，已归还名额");
            }
        });

        let result = self
            .executor
            .run_with_retry(service, &entry.policy, ctx, operation)
            .await;
        ScopeGuard::into_inner(pending);
        let now = self.clock.now();

        match result {
            Ok(value) => {
                let transition = {
                    let mut state = entry.state.lock();
                    state.on_success(now, probe)
                };
                self.emit(transition);
                Ok(value)
            }
            Err(RetryError::Exhausted { error, .. }) => {
                let transition = {
                    let mut state = entry.state.lock();
                    state.on_failure(now, &entry.policy, probe)
                };
                self.emit(transition);
                Err(CallError::Operation(error))
            }
            Err(RetryError::Interrupted {
                attempts, reason, ..
            }) => {
                // 只记录已完成的尝试，被取消的那次不计
                let transition = {
                    let mut state = entry.state.lock();
                    if attempts > 0 {
                        state.on_failure(now, &entry.policy, probe)
                    } else {
                        state.release_probe(probe);
                        None
                    }
                };
                self.emit(transition);
                Err(CallError::Interrupted {
                    service: service.to_string(),
                    attempts,
                    reason,
                })
            }
        }
    }

    /// 获取服务状态
    pub fn get_state(&self, service: &str) -> Option<CircuitStatus> {
        self.entry(service).map(|e| e.state.lock().status())
    }

    /// 获取所有服务的当前状态
    pub fn get_all_states(&self) -> BTreeMap<String, CircuitPhase> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().state.lock().phase()))
            .collect()
    }

    /// 获取所有服务的详细统计，按服务名排序
    pub fn get_detailed_stats(&self) -> Vec<CircuitSnapshot> {
        let mut stats: Vec<CircuitSnapshot> = self
            .entries
            .iter()
            .map(|e| e.value().state.lock().snapshot(&e.value().policy))
            .collect();
        stats.sort_by(|a, b| a.service.cmp(&b.service));
        stats
    }

    /// 重置服务到关闭状态
    ///
    /// 不检查下游是否真的恢复。
    pub fn reset(&self, service: &str) -> Result<(), GuardError> {
        let entry = self
            .entry(service)
            .ok_or_else(|| GuardError::UnknownService(service.to_string()))?;
        let transition = {
            let mut state = entry.state.lock();
            state.reset(self.clock.now())
        };
        self.emit(transition);
        Ok(())
    }

    /// 重置所有服务
    pub fn reset_all(&self) {
        for name in self.service_names() {
            if let Err(e) = self.reset(&name) {
                warn!("重置熔断器失败: {}", e);
            }
        }
    }

    pub fn contains(&self, service: &str) -> bool {
        self.entries.contains_key(service)
    }

    /// 获取服务策略
    pub fn policy(&self, service: &str) -> Option<CircuitPolicy> {
        self.entry(service).map(|e| e.policy.clone())
    }

    /// 已注册的服务名，按字母排序
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn entry(&self, service: &str) -> Option<Arc<CircuitEntry>> {
        self.entries.get(service).map(|e| Arc::clone(e.value()))
    }

    fn emit(&self, transition: Option<TransitionEvent>) {
        if let Some(event) = transition {
            report_safely(self.reporter.as_ref(), &event);
        }
    }
}
