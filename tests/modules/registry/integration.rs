//! 注册表模块集成测试
//!
//! 测试注册表、重试执行器和状态上报之间的交互

use crate::common::*;
use std::sync::Arc;
use std::time::Duration;
use svcguard::{
    circuit::{CircuitPhase, CircuitPolicy, TransitionEvent},
    clock::{Clock, ManualClock},
    error::{CallError, GuardError, Interruption},
    registry::CircuitRegistry,
    reporter::TransitionReporter,
    retry::{AttemptObserver, AttemptRecord, CallContext},
};
use tokio::sync::Notify;

/// 指数退避：500ms、1000ms
#[tokio::test]
async fn test_backoff_delays_follow_policy() {
    let clock = ManualClock::new();
    let registry = create_registry(&clock);
    let op = FlakyOperation::always_failing();

    let result = registry.execute("ledger", || op.invoke()).await;

    assert!(matches!(result, Err(CallError::Operation(UpstreamError(3)))));
    assert_eq!(op.calls(), 3);
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_millis(500), Duration::from_millis(1000)]
    );
}

/// 重试中途成功，不计失败
#[tokio::test]
async fn test_transient_failure_recovers_within_call() {
    let clock = ManualClock::new();
    let registry = create_registry(&clock);
    let op = FlakyOperation::failing_first(2);

    let result = registry.execute("ledger", || op.invoke()).await;

    assert_eq!(result.ok(), Some(3));
    let state = registry.get_state("ledger").unwrap();
    assert_eq!(state.phase, CircuitPhase::Closed);
    assert_eq!(state.failure_count, 0);
    assert_eq!(state.success_count, 1);
}

/// 成功会清零连续失败计数
#[tokio::test]
async fn test_success_resets_consecutive_failures() {
    let clock = ManualClock::new();
    let registry = create_registry(&clock);

    fail_calls(&registry, "ledger", 4).await;
    assert_eq!(registry.get_state("ledger").unwrap().failure_count, 4);

    let op = FlakyOperation::always_succeeding();
    registry.execute("ledger", || op.invoke()).await.unwrap();
    assert_eq!(registry.get_state("ledger").unwrap().failure_count, 0);

    fail_calls(&registry, "ledger", 4).await;
    assert_eq!(
        registry.get_state("ledger").unwrap().phase,
        CircuitPhase::Closed
    );
}

/// 下一次重试会越过截止时间时立即返回
#[tokio::test]
async fn test_deadline_prevents_retry() {
    let clock = ManualClock::new();
    let registry = create_registry(&clock);
    let op = FlakyOperation::always_failing();
    let deadline = clock.now() + chrono::Duration::milliseconds(700);
    let ctx = CallContext::new("anchor_record").with_deadline(deadline);

    let result = registry
        .execute_with("ledger", &ctx, || op.invoke())
        .await;

    match result {
        Err(CallError::Interrupted {
            attempts, reason, ..
        }) => {
            assert_eq!(attempts, 2);
            assert_eq!(reason, Interruption::DeadlineExceeded);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(op.calls(), 2);
    assert_eq!(clock.sleeps(), vec![Duration::from_millis(500)]);
    // 已完成的尝试仍计为一次失败
    assert_eq!(registry.get_state("ledger").unwrap().failure_count, 1);
}

/// 半开状态只放行一个探针
#[tokio::test]
async fn test_half_open_admits_single_probe() {
    let clock = ManualClock::new();
    let reporter = RecordingReporter::new();
    let registry = create_registry_with_reporter(&clock, reporter.clone());

    fail_calls(&registry, "mail", 3).await;
    clock.advance(Duration::from_secs(45));

    let gate = Arc::new(Notify::new());
    let probe = {
        let registry = registry.clone();
        let gate = gate.clone();
        tokio::spawn(async move {
            registry
                .execute("mail", || {
                    let gate = gate.clone();
                    async move {
                        gate.notified().await;
                        Ok::<_, UpstreamError>("probe")
                    }
                })
                .await
        })
    };

    while registry.get_state("mail").unwrap().phase != CircuitPhase::HalfOpen {
        tokio::task::yield_now().await;
    }

    let op = FlakyOperation::always_succeeding();
    let rejected = registry.execute("mail", || op.invoke()).await;
    match rejected {
        Err(CallError::CircuitOpen {
            retry_after_secs, ..
        }) => assert_eq!(retry_after_secs, 45),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(op.calls(), 0);

    gate.notify_one();
    assert_eq!(probe.await.unwrap().unwrap(), "probe");
    assert_eq!(
        reporter.transitions("mail"),
        vec![
            (CircuitPhase::Closed, CircuitPhase::Open),
            (CircuitPhase::Open, CircuitPhase::HalfOpen),
            (CircuitPhase::HalfOpen, CircuitPhase::Closed),
        ]
    );

    let stats = registry.get_detailed_stats();
    let mail = stats.iter().find(|s| s.service == "mail").unwrap();
    assert_eq!(mail.rejected_calls, 1);
}

/// 失败的探针重新打开，冷却期从失败时刻重新计算
#[tokio::test]
async fn test_failed_probe_restarts_cool_down() {
    let clock = ManualClock::new();
    let registry = create_registry(&clock);
    registry
        .register("sms", CircuitPolicy::new(1, 30, 1, 100))
        .unwrap();

    fail_calls(&registry, "sms", 1).await;
    clock.advance(Duration::from_secs(30));
    fail_calls(&registry, "sms", 1).await;

    let probe_failed_at = clock.now();
    let stats = registry.get_detailed_stats();
    let sms = stats.iter().find(|s| s.service == "sms").unwrap();
    assert_eq!(sms.phase, CircuitPhase::Open);
    assert_eq!(
        sms.opened_until,
        Some(probe_failed_at + chrono::Duration::seconds(30))
    );

    clock.advance(Duration::from_secs(29));
    let op = FlakyOperation::always_succeeding();
    assert!(registry
        .execute("sms", || op.invoke())
        .await
        .unwrap_err()
        .is_circuit_open());

    clock.advance(Duration::from_secs(1));
    assert!(registry.execute("sms", || op.invoke()).await.is_ok());
}

/// 自定义 retry_after 覆盖冷却时间提示
#[tokio::test]
async fn test_custom_retry_after_hint() {
    let clock = ManualClock::new();
    let registry = create_registry(&clock);
    registry
        .register("pager", CircuitPolicy::new(1, 30, 1, 100).retry_after_secs(120))
        .unwrap();

    fail_calls(&registry, "pager", 1).await;
    let op = FlakyOperation::always_succeeding();
    match registry.execute("pager", || op.invoke()).await {
        Err(CallError::CircuitOpen {
            retry_after_secs, ..
        }) => assert_eq!(retry_after_secs, 120),
        other => panic!("unexpected result: {:?}", other),
    }
}

/// 手动重置
#[tokio::test]
async fn test_reset_all() {
    let clock = ManualClock::new();
    let reporter = RecordingReporter::new();
    let registry = create_registry_with_reporter(&clock, reporter.clone());

    fail_calls(&registry, "key-management", 2).await;
    fail_calls(&registry, "mail", 3).await;
    assert_eq!(reporter.events().len(), 2);

    registry.reset_all();

    assert!(registry
        .get_all_states()
        .values()
        .all(|phase| *phase == CircuitPhase::Closed));
    assert_eq!(
        reporter.transitions("mail").last(),
        Some(&(CircuitPhase::Open, CircuitPhase::Closed))
    );
    // 关闭状态的服务重置不产生事件
    assert_eq!(reporter.events().len(), 4);
}

/// 总是崩溃的状态上报器
struct PanickingReporter;

impl TransitionReporter for PanickingReporter {
    fn report(&self, event: &TransitionEvent) -> Result<(), GuardError> {
        panic!("reporter crashed on {}", event.service);
    }
}

/// 总是失败的尝试观察者
struct FailingObserver;

impl AttemptObserver for FailingObserver {
    fn on_attempt(&self, _record: &AttemptRecord) -> Result<(), GuardError> {
        Err(GuardError::ReportError("collector offline".to_string()))
    }
}

/// 上报和观察失败不影响调用结果和状态机
#[tokio::test]
async fn test_broken_reporting_does_not_change_outcomes() {
    let clock = ManualClock::new();
    let registry = CircuitRegistry::builder()
        .clock(Arc::new(clock.clone()))
        .reporter(Arc::new(PanickingReporter))
        .observer(Arc::new(FailingObserver))
        .build();
    registry
        .register("ledger", CircuitPolicy::new(2, 30, 2, 100))
        .unwrap();

    let op = FlakyOperation::always_failing();
    let first = registry.execute("ledger", || op.invoke()).await;
    assert!(matches!(first, Err(CallError::Operation(UpstreamError(2)))));
    let second = registry.execute("ledger", || op.invoke()).await;
    assert!(matches!(second, Err(CallError::Operation(UpstreamError(4)))));
    assert_eq!(
        registry.get_state("ledger").unwrap().phase,
        CircuitPhase::Open
    );

    let rejected = registry
        .execute("ledger", || async { Ok::<_, UpstreamError>(0) })
        .await;
    assert!(matches!(
        rejected,
        Err(CallError::CircuitOpen {
            retry_after_secs: 30,
            ..
        })
    ));

    clock.advance(Duration::from_secs(30));
    let op = FlakyOperation::always_succeeding();
    let result = registry.execute("ledger", || op.invoke()).await;
    assert_eq!(result.ok(), Some(1));
    assert_eq!(
        registry.get_state("ledger").unwrap().phase,
        CircuitPhase::Closed
    );
}

/// 调用方超时丢弃半开调用后，下一次调用仍可进入
#[tokio::test]
async fn test_abandoned_half_open_call_does_not_wedge_circuit() {
    let clock = ManualClock::new();
    let registry = create_registry(&clock);
    registry
        .register("registry-timeout", CircuitPolicy::new(1, 60, 1, 100))
        .unwrap();

    let op = FlakyOperation::always_failing();
    let _ = registry.execute("registry-timeout", || op.invoke()).await;
    clock.advance(Duration::from_secs(60));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        registry.execute("registry-timeout", || {
            std::future::pending::<Result<u32, UpstreamError>>()
        }),
    )
    .await;
    assert!(abandoned.is_err());

    clock.advance(Duration::from_secs(3600));
    let op = FlakyOperation::always_succeeding();
    let result = registry.execute("registry-timeout", || op.invoke()).await;
    assert_eq!(result.ok(), Some(1));
    assert_eq!(
        registry.get_state("registry-timeout").unwrap().phase,
        CircuitPhase::Closed
    );
}
