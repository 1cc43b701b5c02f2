//! 内容寻址存储服务

use crate::constants::CONTENT_STORE_SERVICE;
use crate::error::{GuardError, ServiceError};
use crate::guard::ServiceGuard;
use crate::registry::CircuitRegistry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 内容标识（CID）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(pub String);

impl ContentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinStatus {
    Queued,
    Pinning,
    Pinned,
    Failed,
}

/// 存储网关客户端
#[async_trait]
pub trait ContentStoreClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn put(&self, data: &[u8]) -> Result<ContentId, Self::Error>;

    /// 内容不存在时返回 `None`
    async fn get(&self, cid: &ContentId) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn pin(&self, cid: &ContentId) -> Result<PinStatus, Self::Error>;
}

/// 受保护的内容存储服务
pub struct ContentStoreService<C> {
    guard: ServiceGuard,
    client: Arc<C>,
}

impl<C> Clone for ContentStoreService<C> {
    fn clone(&self) -> Self {
        Self {
            guard: self.guard.clone(),
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: ContentStoreClient> ContentStoreService<C> {
    pub fn new(registry: Arc<CircuitRegistry>, client: Arc<C>) -> Result<Self, GuardError> {
        Ok(Self::with_guard(
            ServiceGuard::new(registry, CONTENT_STORE_SERVICE)?,
            client,
        ))
    }

    pub fn with_guard(guard: ServiceGuard, client: Arc<C>) -> Self {
        Self { guard, client }
    }

    pub fn guard(&self) -> &ServiceGuard {
        &self.guard
    }

    pub async fn put(&self, data: &[u8]) -> Result<ContentId, ServiceError<C::Error>> {
        let client = self.client.as_ref();
        self.guard.call("put", move || client.put(data)).await
    }

    pub async fn get(&self, cid: &ContentId) -> Result<Option<Vec<u8>>, ServiceError<C::Error>> {
        let client = self.client.as_ref();
        self.guard.call("get", move || client.get(cid)).await
    }

    pub async fn pin(&self, cid: &ContentId) -> Result<PinStatus, ServiceError<C::Error>> {
        let client = self.client.as_ref();
        self.guard.call("pin", move || client.pin(cid)).await
    }
}
