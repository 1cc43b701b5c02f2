//! 健康检查
//!
//! 从注册表生成只读的健康报告，供存活/就绪探针使用。
//! 任意服务不处于关闭状态即视为降级。

use crate::circuit::CircuitPhase;
use crate::registry::CircuitRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// 单个服务的健康信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub phase: CircuitPhase,
    pub consecutive_failures: u64,
    pub last_transition_at: DateTime<Utc>,
    /// 打开状态下预计进入半开的时间
    pub retry_at: Option<DateTime<Utc>>,
}

/// 健康报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub services: BTreeMap<String, ServiceHealth>,
}

impl HealthReport {
    pub fn from_registry(registry: &CircuitRegistry) -> Self {
        let services: BTreeMap<String, ServiceHealth> = registry
            .get_detailed_stats()
            .into_iter()
            .map(|s| {
                let health = ServiceHealth {
                    phase: s.phase,
                    consecutive_failures: s.consecutive_failures,
                    last_transition_at: s.last_transition_at,
                    retry_at: s.opened_until,
                };
                (s.service, health)
            })
            .collect();

        let status = if services.values().all(|s| s.phase == CircuitPhase::Closed) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        Self {
            status,
            checked_at: registry.clock().now(),
            services,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// 非关闭状态的服务名
    pub fn degraded_services(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|(_, s)| s.phase != CircuitPhase::Closed)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
