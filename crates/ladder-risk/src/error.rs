//! Risk manager error types.

use thiserror::Error;

/// Errors raised by the risk manager.
///
/// Raising is reserved for contract violations (a malformed signal
/// indicates a caller bug); business rejections are returned as
/// `RiskDecision { allowed: false, .. }` values.
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Invalid signal: {reason}")]
    Validation { reason: String },
}

pub type RiskResult<T> = Result<T, RiskError>;
