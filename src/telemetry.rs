//! 监控和日志模块
//!
//! - Prometheus指标：熔断状态变更计数、当前状态Gauge、尝试次数和耗时（`monitoring` 特性）
//! - tracing-subscriber 日志初始化（`telemetry` 特性）
//!
//! # 示例
//!
//! ```rust
//! # #[cfg(feature = "monitoring")]
//! # fn main() -> Result<(), svcguard::GuardError> {
//! use svcguard::telemetry::Metrics;
//!
//! let metrics = Metrics::new()?;
//! let output = metrics.gather();
//! assert!(output.is_empty() || output.contains("svcguard_"));
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "monitoring"))]
//! # fn main() {}
//! ```

#[cfg(feature = "monitoring")]
pub use prometheus_metrics::Metrics;

/// 作为状态变更上报器使用时的名称
#[cfg(feature = "monitoring")]
pub type PrometheusReporter = Metrics;

#[cfg(feature = "telemetry")]
pub use logging::{init_logging, LoggingConfig};

#[cfg(feature = "monitoring")]
mod prometheus_metrics {
    use crate::circuit::{CircuitPhase, TransitionEvent};
    use crate::constants::{
        ATTEMPT_DURATION_BUCKETS, PHASE_GAUGE_CLOSED, PHASE_GAUGE_HALF_OPEN, PHASE_GAUGE_OPEN,
    };
    use crate::error::GuardError;
    use crate::reporter::TransitionReporter;
    use crate::retry::{AttemptObserver, AttemptRecord};
    use prometheus::{
        Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
        TextEncoder,
    };
    use tracing::error;

    /// 监控指标
    ///
    /// 同时实现 [`TransitionReporter`] 和 [`AttemptObserver`]，
    /// 可以直接交给注册表使用。
    #[derive(Clone)]
    pub struct Metrics {
        /// 状态变更次数
        pub transitions_total: IntCounterVec,
        /// 当前状态（0关闭，1半开，2打开）
        pub circuit_phase: IntGaugeVec,
        /// 尝试次数
        pub attempts_total: IntCounterVec,
        /// 单次尝试耗时
        pub attempt_duration: HistogramVec,
        /// 指标注册表
        registry: Registry,
    }

    impl Metrics {
        /// 创建新的监控指标并注册到内部注册表
        pub fn new() -> Result<Self, GuardError> {
            let registry = Registry::new();

            let transitions_total = IntCounterVec::new(
                Opts::new(
                    "svcguard_circuit_transitions_total",
                    "Total number of circuit phase transitions",
                ),
                &["service", "from", "to"],
            )?;

            let circuit_phase = IntGaugeVec::new(
                Opts::new(
                    "svcguard_circuit_phase",
                    "Current circuit phase (0=closed, 1=half_open, 2=open)",
                ),
                &["service"],
            )?;

            let attempts_total = IntCounterVec::new(
                Opts::new(
                    "svcguard_call_attempts_total",
                    "Total number of attempts against external services",
                ),
                &["service", "outcome"],
            )?;

            let attempt_duration = HistogramVec::new(
                HistogramOpts::new(
                    "svcguard_attempt_duration_seconds",
                    "Duration of single attempts in seconds",
                )
                .buckets(ATTEMPT_DURATION_BUCKETS.to_vec()),
                &["service"],
            )?;

            registry.register(Box::new(transitions_total.clone()))?;
            registry.register(Box::new(circuit_phase.clone()))?;
            registry.register(Box::new(attempts_total.clone()))?;
            registry.register(Box::new(attempt_duration.clone()))?;

            Ok(Self {
                transitions_total,
                circuit_phase,
                attempts_total,
                attempt_duration,
                registry,
            })
        }

        /// 注册到外部Registry
        pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
            registry.register(Box::new(self.transitions_total.clone()))?;
            registry.register(Box::new(self.circuit_phase.clone()))?;
            registry.register(Box::new(self.attempts_total.clone()))?;
            registry.register(Box::new(self.attempt_duration.clone()))?;
            Ok(())
        }

        /// 收集所有指标并返回Prometheus格式的文本
        pub fn gather(&self) -> String {
            let encoder = TextEncoder::new();
            let metric_families = self.registry.gather();
            let mut buffer = Vec::new();
            if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                error!("Failed to encode metrics: {}", e);
                return String::new();
            }
            String::from_utf8(buffer).unwrap_or_default()
        }

        /// 初始化服务的状态Gauge为关闭
        pub fn track_service(&self, service: &str) {
            self.circuit_phase
                .with_label_values(&[service])
                .set(PHASE_GAUGE_CLOSED);
        }

        /// 当前状态Gauge值
        pub fn phase_value(&self, service: &str) -> i64 {
            self.circuit_phase.with_label_values(&[service]).get()
        }
    }

    fn gauge_value(phase: CircuitPhase) -> i64 {
        match phase {
            CircuitPhase::Closed => PHASE_GAUGE_CLOSED,
            CircuitPhase::HalfOpen => PHASE_GAUGE_HALF_OPEN,
            CircuitPhase::Open => PHASE_GAUGE_OPEN,
        }
    }

    impl TransitionReporter for Metrics {
        fn report(&self, event: &TransitionEvent) -> Result<(), GuardError> {
            self.transitions_total
                .get_metric_with_label_values(&[
                    event.service.as_str(),
                    event.from.as_str(),
                    event.to.as_str(),
                ])?
                .inc();
            self.circuit_phase
                .get_metric_with_label_values(&[event.service.as_str()])?
                .set(gauge_value(event.to));
            Ok(())
        }

        fn on_register(&self, service: &str) {
            self.track_service(service);
        }
    }

    impl AttemptObserver for Metrics {
        fn on_attempt(&self, record: &AttemptRecord) -> Result<(), GuardError> {
            let outcome = if record.success { "success" } else { "failure" };
            self.attempts_total
                .get_metric_with_label_values(&[record.service.as_str(), outcome])?
                .inc();
            self.attempt_duration
                .get_metric_with_label_values(&[record.service.as_str()])?
                .observe(record.duration.as_secs_f64());
            Ok(())
        }
    }

}

#[cfg(feature = "telemetry")]
mod logging {
    use crate::error::GuardError;
    use serde::{Deserialize, Serialize};
    use tracing_subscriber::EnvFilter;

    /// 日志配置
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LoggingConfig {
        /// EnvFilter 指令，`RUST_LOG` 优先
        pub filter: String,
        /// 是否输出目标模块
        pub with_target: bool,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                filter: "svcguard=info".to_string(),
                with_target: true,
            }
        }
    }

    /// 初始化全局日志订阅者
    ///
    /// 重复初始化返回配置错误。
    pub fn init_logging(config: &LoggingConfig) -> Result<(), GuardError> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.filter))
            .map_err(|e| GuardError::ConfigError(format!("无效的日志过滤器: {}", e)))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.with_target)
            .try_init()
            .map_err(|e| GuardError::ConfigError(format!("日志初始化失败: {}", e)))
    }

}
