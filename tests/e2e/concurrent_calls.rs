//! 端到端测试：并发调用

use crate::common::*;
use futures::future::join_all;
use std::sync::Arc;
use svcguard::{circuit::CircuitPhase, clock::ManualClock, registry::CircuitRegistry};

/// 10个并发成功调用，熔断器保持关闭
#[tokio::test]
async fn test_concurrent_successes_stay_closed() {
    let clock = ManualClock::new();
    let registry = create_registry(&clock);
    let op = FlakyOperation::always_succeeding();
    let (registry_ref, op_ref) = (&registry, &op);

    let calls =
        (0..10).map(move |_| registry_ref.execute("content-store", move || op_ref.invoke()));
    let results = join_all(calls).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(op.calls(), 10);
    let state = registry.get_state("content-store").unwrap();
    assert_eq!(state.phase, CircuitPhase::Closed);
    assert_eq!(state.success_count, 10);
    assert_eq!(state.failure_count, 0);
}

/// 多线程下并发失败只触发一次打开
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_open_exactly_once() {
    let clock = ManualClock::new();
    let reporter = RecordingReporter::new();
    let registry = create_registry_with_reporter(&clock, reporter.clone());

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let registry: Arc<CircuitRegistry> = registry.clone();
            tokio::spawn(async move {
                let op = FlakyOperation::always_failing();
                let _ = registry.execute("mail", || op.invoke()).await;
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(
        registry.get_state("mail").unwrap().phase,
        CircuitPhase::Open
    );
    assert_eq!(
        reporter.transitions("mail"),
        vec![(CircuitPhase::Closed, CircuitPhase::Open)]
    );

    let stats = registry.get_detailed_stats();
    let mail = stats.iter().find(|s| s.service == "mail").unwrap();
    assert_eq!(mail.total_calls + mail.rejected_calls, 20);
    assert_eq!(mail.total_failures, mail.total_calls);
}

/// 不同服务并发调用互不影响
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_across_services() {
    let clock = ManualClock::new();
    let registry = create_registry(&clock);

    let handles: Vec<_> = ["ledger", "content-store", "key-management", "mail"]
        .into_iter()
        .map(|service| {
            let registry = registry.clone();
            tokio::spawn(async move {
                for _ in 0..25 {
                    let op = FlakyOperation::always_succeeding();
                    registry.execute(service, || op.invoke()).await.unwrap();
                }
            })
        })
        .collect();
    for result in join_all(handles).await {
        result.unwrap();
    }

    for (service, phase) in registry.get_all_states() {
        assert_eq!(phase, CircuitPhase::Closed, "{} should stay closed", service);
        assert_eq!(registry.get_state(&service).unwrap().success_count, 25);
    }
}
