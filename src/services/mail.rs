//! 邮件中继服务

use crate::constants::MAIL_SERVICE;
use crate::error::{GuardError, ServiceError};
use crate::guard::ServiceGuard;
use crate::registry::CircuitRegistry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailReceipt {
    pub message_id: String,
    pub accepted: Vec<String>,
}

/// 邮件中继客户端
#[async_trait]
pub trait MailClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn send(&self, message: &MailMessage) -> Result<MailReceipt, Self::Error>;
}

/// 受保护的邮件服务
pub struct MailService<C> {
    guard: ServiceGuard,
    client: Arc<C>,
}

impl<C> Clone for MailService<C> {
    fn clone(&self) -> Self {
        Self {
            guard: self.guard.clone(),
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: MailClient> MailService<C> {
    pub fn new(registry: Arc<CircuitRegistry>, client: Arc<C>) -> Result<Self, GuardError> {
        Ok(Self::with_guard(
            ServiceGuard::new(registry, MAIL_SERVICE)?,
            client,
        ))
    }

    pub fn with_guard(guard: ServiceGuard, client: Arc<C>) -> Self {
        Self { guard, client }
    }

    pub fn guard(&self) -> &ServiceGuard {
        &self.guard
    }

    /// 发送邮件
    ///
    /// 中继失败会重试；熔断打开时返回 [`ServiceError::Unavailable`]，调用方可以稍后重新入队。
    pub async fn send(&self, message: &MailMessage) -> Result<MailReceipt, ServiceError<C::Error>> {
        let client = self.client.as_ref();
        self.guard.call("send", move || client.send(message)).await
    }
}
