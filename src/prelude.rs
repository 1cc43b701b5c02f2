//! Prelude module - Commonly used types for quick imports
//!
//! This module re-exports the most commonly used types from SvcGuard,
//! allowing users to import them with a single `use svcguard::prelude::*;`
//! statement instead of importing each type individually.

// Core types - always available
pub use crate::circuit::{CircuitPhase, CircuitPolicy, CircuitStatus};
pub use crate::config::{GuardConfig, ServiceKind};
pub use crate::error::{CallError, GuardError, ServiceError, ServiceUnavailableError};
pub use crate::guard::{with_circuit_breaker, ServiceGuard};
pub use crate::registry::CircuitRegistry;
pub use crate::retry::CallContext;

// Clocks
pub use crate::clock::{Clock, ManualClock, SystemClock};

// Domain services
pub use crate::services::{
    ContentStoreClient, ContentStoreService, KeyManagementClient, KeyManagementService,
    LedgerClient, LedgerService, MailClient, MailService,
};

// Feature-gated exports
#[cfg(feature = "monitoring")]
pub use crate::telemetry::Metrics;

#[cfg(feature = "telemetry")]
pub use crate::telemetry::{init_logging, LoggingConfig};
