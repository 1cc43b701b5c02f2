//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Centralized configuration constants for SvcGuard.
//!
//! This module provides well-documented constants used throughout the library.
//! All magic numbers are defined here with their purpose and usage context.

// ============================================================================
// Service Names
// ============================================================================

/// Registry key of the distributed-ledger RPC endpoint.
pub const LEDGER_SERVICE: &str = "ledger";

/// Registry key of the content-addressed storage gateway.
pub const CONTENT_STORE_SERVICE: &str = "content-store";

/// Registry key of the key-management service.
pub const KEY_MANAGEMENT_SERVICE: &str = "key-management";

/// Registry key of the mail relay.
pub const MAIL_SERVICE: &str = "mail";

// ============================================================================
// Circuit Breaker Constants
// ============================================================================

/// Default failure threshold for a circuit.
///
/// The circuit opens after this many consecutive failed calls.
pub const DEFAULT_FAILURE_THRESHOLD: u64 = 5;

/// Default cool-down before a half-open probe is allowed (1 minute).
pub const DEFAULT_HALF_OPEN_AFTER_SECS: u64 = 60;

/// Default number of attempts per call, including the first one.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff.
///
/// The n-th retry waits `base * 2^(n-1)` milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Retry-After hint used when a policy has no cool-down to derive it from.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

// ============================================================================
// Per-Service Policy Defaults
// ============================================================================

/// Ledger: payment-critical, tolerates more transient noise.
pub const LEDGER_FAILURE_THRESHOLD: u64 = 5;
pub const LEDGER_HALF_OPEN_AFTER_SECS: u64 = 60;
pub const LEDGER_RETRY_ATTEMPTS: u32 = 3;
pub const LEDGER_RETRY_BASE_DELAY_MS: u64 = 500;

/// Content store: upload/fetch gateway.
pub const CONTENT_STORE_FAILURE_THRESHOLD: u64 = 3;
pub const CONTENT_STORE_HALF_OPEN_AFTER_SECS: u64 = 45;
pub const CONTENT_STORE_RETRY_ATTEMPTS: u32 = 3;
pub const CONTENT_STORE_RETRY_BASE_DELAY_MS: u64 = 300;

/// Key management: failures are likely structural, detect them fast.
pub const KEY_MANAGEMENT_FAILURE_THRESHOLD: u64 = 2;
pub const KEY_MANAGEMENT_HALF_OPEN_AFTER_SECS: u64 = 30;
pub const KEY_MANAGEMENT_RETRY_ATTEMPTS: u32 = 2;
pub const KEY_MANAGEMENT_RETRY_BASE_DELAY_MS: u64 = 200;

/// Mail relay.
pub const MAIL_FAILURE_THRESHOLD: u64 = 3;
pub const MAIL_HALF_OPEN_AFTER_SECS: u64 = 45;
pub const MAIL_RETRY_ATTEMPTS: u32 = 3;
pub const MAIL_RETRY_BASE_DELAY_MS: u64 = 300;

// ============================================================================
// Policy Validation Limits
// ============================================================================

/// Upper bound on attempts per call.
///
/// Keeps worst-case call latency bounded for interactive requests.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Upper bound on the cool-down (1 hour).
pub const MAX_HALF_OPEN_AFTER_SECS: u64 = 3600;

// ============================================================================
// HTTP Mapping
// ============================================================================

pub const STATUS_INTERNAL_ERROR: u16 = 500;
pub const STATUS_BAD_GATEWAY: u16 = 502;
pub const STATUS_SERVICE_UNAVAILABLE: u16 = 503;
pub const STATUS_GATEWAY_TIMEOUT: u16 = 504;

// ============================================================================
// Metrics
// ============================================================================

/// Gauge value exported for a closed circuit.
pub const PHASE_GAUGE_CLOSED: i64 = 0;

/// Gauge value exported for a half-open circuit.
pub const PHASE_GAUGE_HALF_OPEN: i64 = 1;

/// Gauge value exported for an open circuit.
pub const PHASE_GAUGE_OPEN: i64 = 2;

/// Histogram buckets for single-attempt latency, in seconds.
pub const ATTEMPT_DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
