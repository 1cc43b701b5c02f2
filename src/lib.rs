//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! SvcGuard - Resilient External Service Invocation
//!
//! Provides per-service circuit breaking with exponential-backoff retries for
//! calls to unreliable external dependencies.
//!
//! # API Layers
//!
//! ## Prelude (Quick Start)
//!
//! Use `use svcguard::prelude::*;` to import all commonly used types.
//!
//! ## Core API
//!
//! - [`CircuitRegistry`] - One circuit per named service, `execute` entry point
//! - [`ServiceGuard`] - Binds a service name to the registry, maps errors at the boundary
//! - [`CircuitPolicy`] - Per-service thresholds and retry settings
//! - [`GuardConfig`] - Policy configuration (YAML / TOML / JSON)
//! - [`GuardError`] / [`ServiceError`] / [`ServiceUnavailableError`] - Error types
//!
//! ## Domain Services
//!
//! Thin facades over caller-provided clients: ledger, content store,
//! key management and mail. See [`services`].
//!
//! ## Extensions (feature-gated)
//!
//! - Prometheus metrics (requires `monitoring` feature, on by default)
//! - Log subscriber initialisation (requires `telemetry` feature)
//!
//! # Examples
//!
//! ```rust
//! use svcguard::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GuardError> {
//!     let registry = Arc::new(CircuitRegistry::from_config(&GuardConfig::default())?);
//!     let guard = ServiceGuard::new(registry.clone(), "ledger")?;
//!
//!     let block = guard
//!         .call("get_block_number", || async { Ok::<u64, std::io::Error>(19_000_000) })
//!         .await;
//!     assert_eq!(block.ok(), Some(19_000_000));
//!     assert_eq!(registry.get_state("ledger").map(|s| s.phase), Some(CircuitPhase::Closed));
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Explicit state machine**: Closed, Open and HalfOpen with a single probe
//! - **Call-level counting**: a call that exhausts its retries counts as one failure
//! - **Injectable time**: swap [`SystemClock`] for [`ManualClock`] in tests
//! - **Cancellation**: backoff sleeps honour cancellation tokens and deadlines
//! - **Monitoring**: Prometheus counters and gauges for transitions and attempts

pub mod prelude;

pub mod circuit;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod guard;
pub mod health;
pub mod registry;
pub mod reporter;
pub mod retry;
pub mod services;
pub mod telemetry;

pub use circuit::{CircuitPhase, CircuitPolicy, CircuitSnapshot, CircuitStatus, TransitionEvent};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{GuardConfig, ServiceKind};
pub use error::{CallError, GuardError, Interruption, ServiceError, ServiceUnavailableError};
pub use guard::{with_circuit_breaker, ServiceGuard};
pub use health::{HealthReport, HealthStatus};
pub use registry::{CircuitRegistry, CircuitRegistryBuilder};
pub use reporter::{CompositeReporter, LogReporter, TransitionReporter};
pub use retry::{AttemptObserver, AttemptRecord, CallContext, RetryExecutor};

#[cfg(feature = "monitoring")]
pub use telemetry::{Metrics, PrometheusReporter};

