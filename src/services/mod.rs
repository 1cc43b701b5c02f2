//! 领域服务
//!
//! 每个外部依赖一个薄封装：暴露领域方法，内部通过 [`ServiceGuard`] 调用客户端。
//! 客户端由调用方实现（真实网络客户端不在本库范围内）。
//!
//! | 服务 | 客户端 trait | 默认策略 |
//! |------|-------------|----------|
//! | [`LedgerService`] | [`LedgerClient`] | 5次失败 / 60秒 / 3次尝试 / 500ms |
//! | [`ContentStoreService`] | [`ContentStoreClient`] | 3 / 45 / 3 / 300ms |
//! | [`KeyManagementService`] | [`KeyManagementClient`] | 2 / 30 / 2 / 200ms |
//! | [`MailService`] | [`MailClient`] | 3 / 45 / 3 / 300ms |
//!
//! [`ServiceGuard`]: crate::guard::ServiceGuard

pub mod content_store;
pub mod key_management;
pub mod ledger;
pub mod mail;

pub use content_store::{ContentId, ContentStoreClient, ContentStoreService, PinStatus};
pub use key_management::{Ciphertext, DataKey, KeyManagementClient, KeyManagementService};
pub use ledger::{
    AnchorReceipt, LedgerClient, LedgerService, RecordAnchor, TransactionInfo, TransactionStatus,
};
pub use mail::{MailClient, MailMessage, MailReceipt, MailService};
