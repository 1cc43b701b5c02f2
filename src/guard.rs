//! 服务保护层
//!
//! [`ServiceGuard`] 把一个服务名绑定到注册表，所有领域服务都通过它发起调用。
//! 熔断打开时返回 [`ServiceUnavailableError`]，其余错误原样向上传递。
//!
//! # 示例
//!
//! ```rust
//! use svcguard::circuit::CircuitPolicy;
//! use svcguard::guard::ServiceGuard;
//! use svcguard::registry::CircuitRegistry;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), svcguard::GuardError> {
//! let registry = Arc::new(CircuitRegistry::default());
//! registry.register("mail", CircuitPolicy::new(3, 45, 3, 300))?;
//!
//! let guard = ServiceGuard::new(registry, "mail")?;
//! let sent = guard
//!     .call("send", || async { Ok::<_, std::io::Error>(true) })
//!     .await;
//! assert!(sent.is_ok());
//! # Ok(())
//! # }
//! ```

use crate::error::{CallError, GuardError, ServiceError, ServiceUnavailableError};
use crate::registry::CircuitRegistry;
use crate::retry::CallContext;
use std::borrow::Cow;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

impl<E> From<CallError<E>> for ServiceError<E> {
    fn from(error: CallError<E>) -> Self {
        match error {
            CallError::CircuitOpen {
                service,
                retry_after_secs,
            } => ServiceError::Unavailable(ServiceUnavailableError::new(
                service,
                retry_after_secs,
            )),
            CallError::UnknownService(service) => ServiceError::UnknownService(service),
            CallError::Interrupted {
                service,
                attempts,
                reason,
            } => ServiceError::Interrupted {
                service,
                attempts,
                reason,
            },
            CallError::Operation(e) => ServiceError::Upstream(e),
        }
    }
}

/// 单个服务的保护器
///
/// 可以廉价克隆，不持有可变状态。
#[derive(Clone)]
pub struct ServiceGuard {
    registry: Arc<CircuitRegistry>,
    service: String,
}

impl std::fmt::Debug for ServiceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceGuard")
            .field("service", &self.service)
            .finish()
    }
}

impl ServiceGuard {
    /// 创建保护器
    ///
    /// 服务未注册时返回 [`GuardError::UnknownService`]。
    pub fn new(
        registry: Arc<CircuitRegistry>,
        service: impl Into<String>,
    ) -> Result<Self, GuardError> {
        let service = service.into();
        if !registry.contains(&service) {
            return Err(GuardError::UnknownService(service));
        }
        Ok(Self { registry, service })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn registry(&self) -> &Arc<CircuitRegistry> {
        &self.registry
    }

    /// 执行受保护的操作
    pub async fn call<T, E, F, Fut>(
        &self,
        operation_name: impl Into<Cow<'static, str>>,
        operation: F,
    ) -> Result<T, ServiceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.call_with(&CallContext::new(operation_name), operation)
            .await
    }

    /// 带调用上下文执行受保护的操作
    pub async fn call_with<T, E, F, Fut>(
        &self,
        ctx: &CallContext,
        operation: F,
    ) -> Result<T, ServiceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.registry
            .execute_with(&self.service, ctx, operation)
            .await
            .map_err(|e| {
                if e.is_circuit_open() {
                    debug!(
                        service = %self.service,
                        operation = ctx.operation(),
                        "服务不可用，快速失败"
                    );
                }
                ServiceError::from(e)
            })
    }
}

/// 以函数形式执行受保护的操作
///
/// 与 [`ServiceGuard::call`] 语义相同，适合一次性调用。
pub async fn with_circuit_breaker<T, E, F, Fut>(
    registry: &CircuitRegistry,
    service: &str,
    operation: F,
) -> Result<T, ServiceError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    registry
        .execute(service, operation)
        .await
        .map_err(ServiceError::from)
}
