//! 端到端测试模块
//!
//! 测试完整的故障、熔断和恢复场景

#[allow(unused_imports)]
mod concurrent_calls;
