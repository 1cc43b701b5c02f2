//! 状态变更上报
//!
//! 每次熔断状态变更都会生成 [`TransitionEvent`] 交给 [`TransitionReporter`]。
//! 上报永远不会影响调用结果：返回的错误和panic都会被记录为警告后丢弃。

use crate::circuit::TransitionEvent;
use crate::error::GuardError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{info, warn};

/// 状态变更上报器
///
/// 实现不得阻塞调用线程。
pub trait TransitionReporter: Send + Sync {
    fn report(&self, event: &TransitionEvent) -> Result<(), GuardError>;

    /// 服务注册时调用，可用于初始化状态指标
    fn on_register(&self, _service: &str) {}
}

/// 日志上报器
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl TransitionReporter for LogReporter {
    fn report(&self, event: &TransitionEvent) -> Result<(), GuardError> {
        info!(
            service = %event.service,
            from = %event.from,
            to = %event.to,
            at = %event.at,
            "circuit transition"
        );
        Ok(())
    }
}

/// 组合上报器
///
/// 依次调用所有上报器，单个失败不影响其余上报器。
#[derive(Clone, Default)]
pub struct CompositeReporter {
    reporters: Vec<Arc<dyn TransitionReporter>>,
}

impl CompositeReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: Arc<dyn TransitionReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

impl TransitionReporter for CompositeReporter {
    fn report(&self, event: &TransitionEvent) -> Result<(), GuardError> {
        let failures: Vec<String> = self
            .reporters
            .iter()
            .filter_map(|r| deliver(r.as_ref(), event).err())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(GuardError::ReportError(failures.join("; ")))
        }
    }

    fn on_register(&self, service: &str) {
        for reporter in &self.reporters {
            reporter.on_register(service);
        }
    }
}

/// 安全上报：错误和panic只记录日志
pub(crate) fn report_safely(reporter: &dyn TransitionReporter, event: &TransitionEvent) {
    if let Err(reason) = deliver(reporter, event) {
        warn!(
            service = %event.service,
            from = %event.from,
            to = %event.to,
            "状态变更上报失败: {}",
            reason
        );
    }
}

fn deliver(reporter: &dyn TransitionReporter, event: &TransitionEvent) -> Result<(), String> {
    match catch_unwind(AssertUnwindSafe(|| reporter.report(event))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("reporter panicked".to_string()),
    }
}
