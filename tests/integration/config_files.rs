//! 集成测试：配置文件加载
//!
//! 写出默认配置，再从磁盘读回并构建注册表。

use std::io::Write;
use svcguard::{config::GuardConfig, registry::CircuitRegistry};

#[test]
fn test_yaml_file_round_trip() {
    let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
    file.write_all(GuardConfig::default().to_yaml().unwrap().as_bytes())
        .unwrap();

    let config = GuardConfig::from_file(file.path()).unwrap();
    assert_eq!(config, GuardConfig::default());

    let registry = CircuitRegistry::from_config(&config).unwrap();
    assert_eq!(
        registry.service_names(),
        vec!["content-store", "key-management", "ledger", "mail"]
    );
}

#[test]
fn test_json_file_with_extra_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("guard.json");
    let config = GuardConfig::default().with_service(
        "sms",
        svcguard::circuit::CircuitPolicy::new(4, 20, 2, 150),
    );
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = GuardConfig::from_file(&path).unwrap();
    assert_eq!(loaded.services.len(), 5);
    assert_eq!(loaded.policy("sms").unwrap().half_open_after_secs, 20);
}
