//! 配置模块集成测试
//!
//! 测试配置加载与注册表的集成

use std::sync::Arc;
use svcguard::{
    circuit::CircuitPolicy,
    clock::ManualClock,
    config::{GuardConfig, ServiceKind},
    error::GuardError,
    registry::CircuitRegistry,
};

#[test]
fn test_default_config_registers_builtin_services() {
    let registry = CircuitRegistry::from_config(&GuardConfig::default()).unwrap();

    assert_eq!(registry.len(), 4);
    for kind in ServiceKind::builtin() {
        assert_eq!(
            registry.policy(kind.as_str()),
            Some(kind.default_policy()),
            "policy mismatch for {}",
            kind.as_str()
        );
    }
}

#[test]
fn test_json_config_to_registry() {
    let json = r#"{
        "services": {
            "ledger": {
                "failure_threshold": 8,
                "half_open_after_secs": 120,
                "retry_attempts": 4,
                "retry_base_delay_ms": 250
            }
        }
    }"#;

    let config = GuardConfig::from_json_str(json).unwrap();
    let registry = CircuitRegistry::builder()
        .clock(Arc::new(ManualClock::new()))
        .build_from_config(&config)
        .unwrap();

    assert_eq!(registry.service_names(), vec!["ledger"]);
    assert_eq!(
        registry.policy("ledger"),
        Some(CircuitPolicy::new(8, 120, 4, 250))
    );
}

#[test]
fn test_toml_file_to_registry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("svcguard.toml");
    std::fs::write(
        &path,
        r#"
[services.mail]
failure_threshold = 3
half_open_after_secs = 45
retry_attempts = 3
retry_base_delay_ms = 300
retry_after_secs = 90
"#,
    )
    .unwrap();

    let config = GuardConfig::from_file(&path).unwrap();
    let registry = CircuitRegistry::from_config(&config).unwrap();
    let policy = registry.policy("mail").unwrap();
    assert_eq!(policy.effective_retry_after_secs(), 90);
}

#[test]
fn test_invalid_config_registers_nothing() {
    let config = GuardConfig::default().with_service("ledger", CircuitPolicy::new(5, 60, 0, 500));
    let result = CircuitRegistry::from_config(&config);
    assert!(matches!(result, Err(GuardError::ConfigError(_))));
}

#[test]
fn test_missing_file() {
    let result = GuardConfig::from_file("/nonexistent/svcguard.yaml");
    assert!(matches!(result, Err(GuardError::IoError(_))));
}
