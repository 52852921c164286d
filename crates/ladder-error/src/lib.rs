//! Error taxonomy and recovery-strategy engine.
//!
//! Provides:
//! - `TradingError`: typed domain errors carrying code, domain, severity and
//!   retryability
//! - `ErrorHandler`: strategy dispatcher (RETRY / FALLBACK /
//!   GRACEFUL_DEGRADE / SKIP / THROW) with exponential backoff
//!
//! The handler performs no telemetry recording itself; callers record
//! outcomes into the registry (see `ladder-telemetry`).

pub mod handler;
pub mod taxonomy;

pub use handler::{
    ErrorHandler, Handled, Recovery, RecoveryObserver, RecoveryStrategy, RetryPolicy,
};
pub use taxonomy::{
    BoxError, ErrorDomain, Severity, TradingError, TradingResult, RETRYABLE_CODES,
};
