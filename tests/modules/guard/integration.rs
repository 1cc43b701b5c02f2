//! 服务保护层集成测试
//!
//! 测试领域服务、保护器和注册表的集成

use crate::common::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use svcguard::{
    circuit::CircuitPhase,
    clock::ManualClock,
    error::{ServiceError, ServiceUnavailableError},
    guard::{with_circuit_breaker, ServiceGuard},
    services::{
        AnchorReceipt, LedgerClient, LedgerService, MailClient, MailMessage, MailReceipt,
        MailService, RecordAnchor, TransactionInfo,
    },
};

/// 可切换故障的账本节点
#[derive(Default)]
struct SwitchableLedger {
    down: AtomicBool,
}

#[async_trait]
impl LedgerClient for SwitchableLedger {
    type Error = UpstreamError;

    async fn anchor_record(&self, anchor: &RecordAnchor) -> Result<AnchorReceipt, UpstreamError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(UpstreamError(503));
        }
        Ok(AnchorReceipt {
            transaction_hash: format!("0x{}", anchor.record_id),
            block_number: Some(1),
        })
    }

    async fn verify_record(&self, _anchor: &RecordAnchor) -> Result<bool, UpstreamError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(UpstreamError(503));
        }
        Ok(true)
    }

    async fn get_transaction(&self, _hash: &str) -> Result<Option<TransactionInfo>, UpstreamError> {
        Ok(None)
    }
}

struct NullRelay;

#[async_trait]
impl MailClient for NullRelay {
    type Error = UpstreamError;

    async fn send(&self, message: &MailMessage) -> Result<MailReceipt, UpstreamError> {
        Ok(MailReceipt {
            message_id: "<1@null>".to_string(),
            accepted: message.to.clone(),
        })
    }
}

/// 服务之间的熔断器互相独立
#[tokio::test]
async fn test_services_are_isolated() {
    let clock = ManualClock::new();
    let registry = create_registry(&clock);
    let node = Arc::new(SwitchableLedger::default());
    node.down.store(true, Ordering::SeqCst);

    let ledger = LedgerService::new(registry.clone(), node.clone()).unwrap();
    let mail = MailService::new(registry.clone(), Arc::new(NullRelay)).unwrap();

    let anchor = RecordAnchor::new("claim-1", "0xabc");
    for _ in 0..5 {
        assert!(ledger.anchor_record(&anchor).await.is_err());
    }

    assert_eq!(
        registry.get_state("ledger").unwrap().phase,
        CircuitPhase::Open
    );
    let receipt = mail
        .send(&MailMessage::new("billing@example.org", "Claim queued", "claim-1"))
        .await
        .unwrap();
    assert_eq!(receipt.accepted, vec!["billing@example.org"]);
    assert_eq!(
        registry.get_state("mail").unwrap().phase,
        CircuitPhase::Closed
    );
}

/// 同一服务的不同操作共享一个熔断器
#[tokio::test]
async fn test_operations_share_service_circuit() {
    let clock = ManualClock::new();
    let registry = create_registry(&clock);
    let node = Arc::new(SwitchableLedger::default());
    node.down.store(true, Ordering::SeqCst);
    let ledger = LedgerService::new(registry.clone(), node.clone()).unwrap();

    let anchor = RecordAnchor::new("claim-2", "0xdef");
    for _ in 0..5 {
        let _ = ledger.verify_record(&anchor).await;
    }

    node.down.store(false, Ordering::SeqCst);
    let error = ledger.anchor_record(&anchor).await.unwrap_err();
    match error {
        ServiceError::Unavailable(ServiceUnavailableError {
            service,
            retry_after_secs,
        }) => {
            assert_eq!(service, "ledger");
            assert_eq!(retry_after_secs, 60);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

/// 两个保护器指向同一服务时看到同一状态
#[tokio::test]
async fn test_guards_share_registry_state() {
    let clock = ManualClock::new();
    let registry = create_registry(&clock);
    let first = ServiceGuard::new(registry.clone(), "key-management").unwrap();
    let second = ServiceGuard::new(registry.clone(), "key-management").unwrap();
    assert_eq!(first.service(), second.service());

    for _ in 0..2 {
        let op = FlakyOperation::always_failing();
        let _ = first.call("encrypt", || op.invoke()).await;
    }

    let op = FlakyOperation::always_succeeding();
    let error = second.call("decrypt", || op.invoke()).await.unwrap_err();
    assert_eq!(error.status_code(), 503);
    assert_eq!(error.retry_after(), Some(Duration::from_secs(30)));
    assert_eq!(op.calls(), 0);
}

#[tokio::test]
async fn test_with_circuit_breaker_keeps_upstream_error() {
    let clock = ManualClock::new();
    let registry = create_registry(&clock);
    let op = FlakyOperation::always_failing();

    let error = with_circuit_breaker(&registry, "content-store", || op.invoke())
        .await
        .unwrap_err();

    assert_eq!(error.status_code(), 502);
    assert_eq!(error.into_upstream(), Some(UpstreamError(3)));
}
