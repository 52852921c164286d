//! Execution error types.

use ladder_error::TradingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    /// Another exit flow already holds the lock for this position.
    #[error("Exit already in progress for position {position_id}")]
    ExitInProgress { position_id: String },

    /// An exchange action failed after recovery was exhausted.
    #[error("Exchange action failed: {0}")]
    Exchange(TradingError),

    /// The signal violates the entry contract (caller bug).
    #[error("Invalid signal: {reason}")]
    InvalidSignal { reason: String },

    /// Configuration could not be loaded or validated.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type ExecResult<T> = Result<T, ExecError>;
