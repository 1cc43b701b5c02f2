//! 分布式账本服务
//!
//! 记录锚定、校验和交易查询。账本合约语义由 [`LedgerClient`] 实现方负责。

use crate::constants::LEDGER_SERVICE;
use crate::error::{GuardError, ServiceError};
use crate::guard::ServiceGuard;
use crate::registry::CircuitRegistry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 待锚定的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAnchor {
    pub record_id: String,
    /// 记录内容哈希（十六进制）
    pub content_hash: String,
}

impl RecordAnchor {
    pub fn new(record_id: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            content_hash: content_hash.into(),
        }
    }
}

/// 锚定回执
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Reverted,
}

/// 交易信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub hash: String,
    pub status: TransactionStatus,
    pub block_number: Option<u64>,
    pub confirmations: u64,
}

/// 账本RPC客户端
#[async_trait]
pub trait LedgerClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn anchor_record(&self, anchor: &RecordAnchor) -> Result<AnchorReceipt, Self::Error>;

    /// 校验记录哈希是否与链上一致
    async fn verify_record(&self, anchor: &RecordAnchor) -> Result<bool, Self::Error>;

    async fn get_transaction(&self, hash: &str) -> Result<Option<TransactionInfo>, Self::Error>;
}

/// 受保护的账本服务
pub struct LedgerService<C> {
    guard: ServiceGuard,
    client: Arc<C>,
}

impl<C> Clone for LedgerService<C> {
    fn clone(&self) -> Self {
        Self {
            guard: self.guard.clone(),
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: LedgerClient> LedgerService<C> {
    /// 使用注册表中的 `ledger` 熔断器
    pub fn new(registry: Arc<CircuitRegistry>, client: Arc<C>) -> Result<Self, GuardError> {
        Ok(Self::with_guard(
            ServiceGuard::new(registry, LEDGER_SERVICE)?,
            client,
        ))
    }

    pub fn with_guard(guard: ServiceGuard, client: Arc<C>) -> Self {
        Self { guard, client }
    }

    pub fn guard(&self) -> &ServiceGuard {
        &self.guard
    }

    /// 锚定记录
    pub async fn anchor_record(
        &self,
        anchor: &RecordAnchor,
    ) -> Result<AnchorReceipt, ServiceError<C::Error>> {
        let client = self.client.as_ref();
        self.guard
            .call("anchor_record", move || client.anchor_record(anchor))
            .await
    }

    /// 校验记录
    pub async fn verify_record(&self, anchor: &RecordAnchor) -> Result<bool, ServiceError<C::Error>> {
        let client = self.client.as_ref();
        self.guard
            .call("verify_record", move || client.verify_record(anchor))
            .await
    }

    /// 查询交易
    pub async fn get_transaction(
        &self,
        hash: &str,
    ) -> Result<Option<TransactionInfo>, ServiceError<C::Error>> {
        let client = self.client.as_ref();
        self.guard
            .call("get_transaction", move || client.get_transaction(hash))
            .await
    }
}
