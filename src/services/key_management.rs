//! 密钥管理服务
//!
//! 明文数据密钥用 [`SecretVec`] 包装，Debug 输出不会泄露内容。

use crate::constants::KEY_MANAGEMENT_SERVICE;
use crate::error::{GuardError, ServiceError};
use crate::guard::ServiceGuard;
use crate::registry::CircuitRegistry;
use async_trait::async_trait;
use secrecy::SecretVec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 密文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub key_id: String,
    pub blob: Vec<u8>,
}

/// 数据密钥
pub struct DataKey {
    pub key_id: String,
    pub plaintext: SecretVec<u8>,
    /// 由主密钥加密后的数据密钥
    pub encrypted: Ciphertext,
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataKey")
            .field("key_id", &self.key_id)
            .field("plaintext", &"[REDACTED]")
            .field("encrypted", &self.encrypted)
            .finish()
    }
}

/// KMS客户端
#[async_trait]
pub trait KeyManagementClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Ciphertext, Self::Error>;

    async fn decrypt(&self, ciphertext: &Ciphertext) -> Result<SecretVec<u8>, Self::Error>;

    async fn generate_data_key(&self, key_id: &str) -> Result<DataKey, Self::Error>;
}

/// 受保护的密钥管理服务
pub struct KeyManagementService<C> {
    guard: ServiceGuard,
    client: Arc<C>,
}

impl<C> Clone for KeyManagementService<C> {
    fn clone(&self) -> Self {
        Self {
            guard: self.guard.clone(),
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: KeyManagementClient> KeyManagementService<C> {
    pub fn new(registry: Arc<CircuitRegistry>, client: Arc<C>) -> Result<Self, GuardError> {
        Ok(Self::with_guard(
            ServiceGuard::new(registry, KEY_MANAGEMENT_SERVICE)?,
            client,
        ))
    }

    pub fn with_guard(guard: ServiceGuard, client: Arc<C>) -> Self {
        Self { guard, client }
    }

    pub fn guard(&self) -> &ServiceGuard {
        &self.guard
    }

    pub async fn encrypt(
        &self,
        key_id: &str,
        plaintext: &[u8],
    ) -> Result<Ciphertext, ServiceError<C::Error>> {
        let client = self.client.as_ref();
        self.guard
            .call("encrypt", move || client.encrypt(key_id, plaintext))
            .await
    }

    pub async fn decrypt(
        &self,
        ciphertext: &Ciphertext,
    ) -> Result<SecretVec<u8>, ServiceError<C::Error>> {
        let client = self.client.as_ref();
        self.guard
            .call("decrypt", move || client.decrypt(ciphertext))
            .await
    }

    pub async fn generate_data_key(&self, key_id: &str) -> Result<DataKey, ServiceError<C::Error>> {
        let client = self.client.as_ref();
        self.guard
            .call("generate_data_key", move || client.generate_data_key(key_id))
            .await
    }
}
