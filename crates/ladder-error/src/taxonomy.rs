//! Typed trading errors.
//!
//! Every error carries a stable string code, a domain and a severity.
//! Retryability is derived from a fixed allow-list of codes considered
//! transient; recoverability is derived from severity (CRITICAL errors are
//! never recoverable).

use rust_decimal::Decimal;
use thiserror::Error;

/// Boxed error as produced by collaborator boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for operations that fail with a `TradingError`.
pub type TradingResult<T> = std::result::Result<T, TradingError>;

/// Error codes eligible for automatic retry (transient failures).
pub const RETRYABLE_CODES: [&str; 4] = [
    "EXCHANGE_API_ERROR",
    "EXCHANGE_CONNECTION_ERROR",
    "EXCHANGE_RATE_LIMIT",
    "ORDER_TIMEOUT",
];

/// Error domain classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    Trading,
    Exchange,
    Position,
    Order,
    Configuration,
    Internal,
    Performance,
    Persistence,
}

impl std::fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trading => write!(f, "TRADING"),
            Self::Exchange => write!(f, "EXCHANGE"),
            Self::Position => write!(f, "POSITION"),
            Self::Order => write!(f, "ORDER"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Performance => write!(f, "PERFORMANCE"),
            Self::Persistence => write!(f, "PERSISTENCE"),
        }
    }
}

/// Error severity.
///
/// CRITICAL errors halt the affected subsystem and are never recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "CRITICAL"),
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// Domain error taxonomy for the trading core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradingError {
    // === TRADING ===
    #[error("Entry validation failed: {reason}")]
    EntryValidation { reason: String },

    #[error("Exit execution failed for {symbol}: {reason}")]
    ExitExecution { symbol: String, reason: String },

    #[error("Strategy execution failed: {reason}")]
    StrategyExecution { reason: String },

    #[error("Risk limit exceeded: {limit}")]
    RiskLimitExceeded { limit: String },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    // === EXCHANGE ===
    #[error("Exchange connection error: {reason}")]
    ExchangeConnection { reason: String },

    #[error("Exchange rate limit hit, retry after {retry_after_ms}ms")]
    ExchangeRateLimit { retry_after_ms: u64 },

    #[error("Exchange API error: {reason}")]
    ExchangeApi { reason: String },

    #[error("Order rejected by exchange: {reason}")]
    OrderRejected { reason: String },

    // === POSITION ===
    #[error("Position not found: {position_id}")]
    PositionNotFound { position_id: String },

    #[error("Position {position_id} in unexpected state: expected {expected}, got {actual}")]
    PositionInvalidState {
        position_id: String,
        expected: String,
        actual: String,
    },

    #[error("Position sizing failed: {reason}")]
    PositionSizing { reason: String },

    #[error("Leverage {requested}x exceeds maximum {max}x")]
    PositionLeverage { requested: u32, max: u32 },

    // === ORDER ===
    #[error("Order timed out after {duration_ms}ms")]
    OrderTimeout { duration_ms: u64 },

    #[error("Order slippage: expected {expected}, filled at {actual}")]
    OrderSlippage { expected: Decimal, actual: Decimal },

    #[error("Order cancelled: {reason}")]
    OrderCancelled { reason: String },

    #[error("Order validation failed: {reason}")]
    OrderValidation { reason: String },

    // === PERSISTENCE ===
    #[error("Journal read failed: {reason}")]
    JournalRead { reason: String },

    #[error("Journal write failed: {reason}")]
    JournalWrite { reason: String },

    #[error("CSV export failed: {reason}")]
    CsvExport { reason: String },

    // === CONFIGURATION ===
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    // === PERFORMANCE ===
    #[error("Performance degradation in {metric}: {detail}")]
    Performance { metric: String, detail: String },

    // === INTERNAL ===
    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl TradingError {
    /// Stable string code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EntryValidation { .. } => "TRADING_ENTRY_VALIDATION",
            Self::ExitExecution { .. } => "TRADING_EXIT_EXECUTION",
            Self::StrategyExecution { .. } => "TRADING_STRATEGY_EXECUTION",
            Self::RiskLimitExceeded { .. } => "TRADING_RISK_LIMIT_EXCEEDED",
            Self::InsufficientBalance { .. } => "TRADING_INSUFFICIENT_BALANCE",
            Self::ExchangeConnection { .. } => "EXCHANGE_CONNECTION_ERROR",
            Self::ExchangeRateLimit { .. } => "EXCHANGE_RATE_LIMIT",
            Self::ExchangeApi { .. } => "EXCHANGE_API_ERROR",
            Self::OrderRejected { .. } => "EXCHANGE_ORDER_REJECTED",
            Self::PositionNotFound { .. } => "POSITION_NOT_FOUND",
            Self::PositionInvalidState { .. } => "POSITION_INVALID_STATE",
            Self::PositionSizing { .. } => "POSITION_SIZING_ERROR",
            Self::PositionLeverage { .. } => "POSITION_LEVERAGE_ERROR",
            Self::OrderTimeout { .. } => "ORDER_TIMEOUT",
            Self::OrderSlippage { .. } => "ORDER_SLIPPAGE",
            Self::OrderCancelled { .. } => "ORDER_CANCELLED",
            Self::OrderValidation { .. } => "ORDER_VALIDATION",
            Self::JournalRead { .. } => "PERSISTENCE_JOURNAL_READ",
            Self::JournalWrite { .. } => "PERSISTENCE_JOURNAL_WRITE",
            Self::CsvExport { .. } => "PERSISTENCE_CSV_EXPORT",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Performance { .. } => "PERFORMANCE_DEGRADATION",
            Self::Unknown { .. } => "UNKNOWN_ERROR",
        }
    }

    /// Domain classification.
    #[must_use]
    pub fn domain(&self) -> ErrorDomain {
        match self {
            Self::EntryValidation { .. }
            | Self::ExitExecution { .. }
            | Self::StrategyExecution { .. }
            | Self::RiskLimitExceeded { .. }
            | Self::InsufficientBalance { .. } => ErrorDomain::Trading,
            Self::ExchangeConnection { .. }
            | Self::ExchangeRateLimit { .. }
            | Self::ExchangeApi { .. }
            | Self::OrderRejected { .. } => ErrorDomain::Exchange,
            Self::PositionNotFound { .. }
            | Self::PositionInvalidState { .. }
            | Self::PositionSizing { .. }
            | Self::PositionLeverage { .. } => ErrorDomain::Position,
            Self::OrderTimeout { .. }
            | Self::OrderSlippage { .. }
            | Self::OrderCancelled { .. }
            | Self::OrderValidation { .. } => ErrorDomain::Order,
            Self::JournalRead { .. } | Self::JournalWrite { .. } | Self::CsvExport { .. } => {
                ErrorDomain::Persistence
            }
            Self::Configuration { .. } => ErrorDomain::Configuration,
            Self::Performance { .. } => ErrorDomain::Performance,
            Self::Unknown { .. } => ErrorDomain::Internal,
        }
    }

    /// Severity classification.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::InsufficientBalance { .. } | Self::Configuration { .. } => Severity::Critical,
            Self::ExitExecution { .. }
            | Self::RiskLimitExceeded { .. }
            | Self::ExchangeConnection { .. }
            | Self::ExchangeApi { .. }
            | Self::OrderTimeout { .. } => Severity::High,
            Self::EntryValidation { .. }
            | Self::StrategyExecution { .. }
            | Self::ExchangeRateLimit { .. }
            | Self::OrderRejected { .. }
            | Self::PositionNotFound { .. }
            | Self::PositionInvalidState { .. }
            | Self::PositionSizing { .. }
            | Self::PositionLeverage { .. }
            | Self::OrderSlippage { .. }
            | Self::OrderValidation { .. }
            | Self::JournalWrite { .. }
            | Self::Unknown { .. } => Severity::Medium,
            Self::OrderCancelled { .. }
            | Self::JournalRead { .. }
            | Self::CsvExport { .. }
            | Self::Performance { .. } => Severity::Low,
        }
    }

    /// Whether recovery is possible at all. False iff CRITICAL.
    #[must_use]
    pub fn recoverable(&self) -> bool {
        self.severity() != Severity::Critical
    }

    /// Whether this error is transient and eligible for automatic retry.
    #[must_use]
    pub fn retryable(&self) -> bool {
        RETRYABLE_CODES.contains(&self.code())
    }

    /// Registry key: `code:DOMAIN`.
    #[must_use]
    pub fn registry_key(&self) -> String {
        format!("{}:{}", self.code(), self.domain())
    }

    /// Normalize any boxed error into a `TradingError`.
    ///
    /// A `TradingError` passes through unchanged; anything else is wrapped
    /// as `Unknown` preserving its display text.
    #[must_use]
    pub fn normalize(err: BoxError) -> Self {
        match err.downcast::<TradingError>() {
            Ok(e) => *e,
            Err(other) => Self::Unknown {
                message: other.to_string(),
            },
        }
    }
}

impl From<String> for TradingError {
    fn from(message: String) -> Self {
        Self::Unknown { message }
    }
}

impl From<&str> for TradingError {
    fn from(message: &str) -> Self {
        Self::Unknown {
            message: message.to_string(),
        }
    }
}
