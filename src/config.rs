//! 配置模块
//!
//! 定义每个外部服务的熔断策略配置，支持 YAML / TOML / JSON。
//!
//! ```yaml
//! services:
//!   ledger:
//!     failure_threshold: 5
//!     half_open_after_secs: 60
//!     retry_attempts: 3
//!     retry_base_delay_ms: 500
//! ```

use crate::circuit::CircuitPolicy;
use crate::constants::{
    CONTENT_STORE_FAILURE_THRESHOLD, CONTENT_STORE_HALF_OPEN_AFTER_SECS,
    CONTENT_STORE_RETRY_ATTEMPTS, CONTENT_STORE_RETRY_BASE_DELAY_MS, CONTENT_STORE_SERVICE,
    KEY_MANAGEMENT_FAILURE_THRESHOLD, KEY_MANAGEMENT_HALF_OPEN_AFTER_SECS,
    KEY_MANAGEMENT_RETRY_ATTEMPTS, KEY_MANAGEMENT_RETRY_BASE_DELAY_MS, KEY_MANAGEMENT_SERVICE,
    LEDGER_FAILURE_THRESHOLD, LEDGER_HALF_OPEN_AFTER_SECS, LEDGER_RETRY_ATTEMPTS,
    LEDGER_RETRY_BASE_DELAY_MS, LEDGER_SERVICE, MAIL_FAILURE_THRESHOLD, MAIL_HALF_OPEN_AFTER_SECS,
    MAIL_RETRY_ATTEMPTS, MAIL_RETRY_BASE_DELAY_MS, MAIL_SERVICE,
};
use crate::error::GuardError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// 已知的外部依赖
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    /// 分布式账本RPC
    Ledger,
    /// 内容寻址存储网关
    ContentStore,
    /// 密钥管理服务
    KeyManagement,
    /// 邮件中继
    Mail,
    /// 其他服务
    Other(String),
}

impl ServiceKind {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            LEDGER_SERVICE => ServiceKind::Ledger,
            CONTENT_STORE_SERVICE => ServiceKind::ContentStore,
            KEY_MANAGEMENT_SERVICE => ServiceKind::KeyManagement,
            MAIL_SERVICE => ServiceKind::Mail,
            other => ServiceKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ServiceKind::Ledger => LEDGER_SERVICE,
            ServiceKind::ContentStore => CONTENT_STORE_SERVICE,
            ServiceKind::KeyManagement => KEY_MANAGEMENT_SERVICE,
            ServiceKind::Mail => MAIL_SERVICE,
            ServiceKind::Other(s) => s,
        }
    }

    /// 内置的默认策略
    pub fn default_policy(&self) -> CircuitPolicy {
        match self {
            ServiceKind::Ledger => CircuitPolicy::new(
                LEDGER_FAILURE_THRESHOLD,
                LEDGER_HALF_OPEN_AFTER_SECS,
                LEDGER_RETRY_ATTEMPTS,
                LEDGER_RETRY_BASE_DELAY_MS,
            ),
            ServiceKind::ContentStore => CircuitPolicy::new(
                CONTENT_STORE_FAILURE_THRESHOLD,
                CONTENT_STORE_HALF_OPEN_AFTER_SECS,
                CONTENT_STORE_RETRY_ATTEMPTS,
                CONTENT_STORE_RETRY_BASE_DELAY_MS,
            ),
            ServiceKind::KeyManagement => CircuitPolicy::new(
                KEY_MANAGEMENT_FAILURE_THRESHOLD,
                KEY_MANAGEMENT_HALF_OPEN_AFTER_SECS,
                KEY_MANAGEMENT_RETRY_ATTEMPTS,
                KEY_MANAGEMENT_RETRY_BASE_DELAY_MS,
            ),
            ServiceKind::Mail => CircuitPolicy::new(
                MAIL_FAILURE_THRESHOLD,
                MAIL_HALF_OPEN_AFTER_SECS,
                MAIL_RETRY_ATTEMPTS,
                MAIL_RETRY_BASE_DELAY_MS,
            ),
            ServiceKind::Other(_) => CircuitPolicy::default(),
        }
    }

    /// 四个内置服务
    pub fn builtin() -> [ServiceKind; 4] {
        [
            ServiceKind::Ledger,
            ServiceKind::ContentStore,
            ServiceKind::KeyManagement,
            ServiceKind::Mail,
        ]
    }
}

/// 熔断配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// 服务名 -> 策略
    pub services: BTreeMap<String, CircuitPolicy>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        let services = ServiceKind::builtin()
            .iter()
            .map(|kind| (kind.as_str().to_string(), kind.default_policy()))
            .collect();
        Self { services }
    }
}

impl GuardConfig {
    /// 空配置
    pub fn empty() -> Self {
        Self {
            services: BTreeMap::new(),
        }
    }

    /// 添加或替换服务策略
    pub fn with_service(mut self, name: impl Into<String>, policy: CircuitPolicy) -> Self {
        self.services.insert(name.into(), policy);
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), GuardError> {
        if self.services.is_empty() {
            return Err(GuardError::ConfigError("至少需要一个服务".to_string()));
        }

        for (name, policy) in &self.services {
            if name.trim().is_empty() {
                return Err(GuardError::ConfigError("服务名不能为空".to_string()));
            }
            policy.validate().map_err(|e| match e {
                GuardError::ConfigError(msg) => {
                    GuardError::ConfigError(format!("服务[{}]校验失败: {}", name, msg))
                }
                other => other,
            })?;
        }

        Ok(())
    }

    /// 从YAML解析
    pub fn from_yaml_str(s: &str) -> Result<Self, GuardError> {
        let config: GuardConfig = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// 从TOML解析
    pub fn from_toml_str(s: &str) -> Result<Self, GuardError> {
        let config: GuardConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// 从JSON解析
    pub fn from_json_str(s: &str) -> Result<Self, GuardError> {
        let config: GuardConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// 按扩展名读取配置文件
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GuardError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&content),
            "toml" => Self::from_toml_str(&content),
            "json" => Self::from_json_str(&content),
            other => Err(GuardError::ConfigError(format!(
                "不支持的配置文件格式: {:?}",
                other
            ))),
        }
    }

    /// 序列化为YAML
    pub fn to_yaml(&self) -> Result<String, GuardError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn policy(&self, service: &str) -> Option<&CircuitPolicy> {
        self.services.get(service)
    }
}
