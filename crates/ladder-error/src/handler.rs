//! Recovery-strategy engine.
//!
//! Wraps fallible async operations with a per-call-site `RecoveryStrategy`.
//! RETRY is the only strategy that suspends the calling flow (exponential
//! backoff between attempts); the rest resolve immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::taxonomy::{BoxError, TradingError};

// ============================================================================
// RecoveryStrategy
// ============================================================================

/// Recovery policy selected per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStrategy {
    /// Retry with exponential backoff (retryable errors only).
    Retry,
    /// Report recovered; caller substitutes alternate logic.
    Fallback,
    /// Report recovered; caller continues with reduced functionality.
    GracefulDegrade,
    /// Report recovered; operation is cancelled, caller continues.
    Skip,
    /// Report not recovered; caller must re-raise.
    Throw,
}

impl RecoveryStrategy {
    /// Lenient parse for config strings.
    ///
    /// Unknown input logs a warning and yields `Throw`.
    #[must_use]
    pub fn from_config_str(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "RETRY" => Self::Retry,
            "FALLBACK" => Self::Fallback,
            "GRACEFUL_DEGRADE" => Self::GracefulDegrade,
            "SKIP" => Self::Skip,
            "THROW" => Self::Throw,
            other => {
                warn!(strategy = other, "Unknown recovery strategy, defaulting to THROW");
                Self::Throw
            }
        }
    }
}

impl std::fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retry => write!(f, "RETRY"),
            Self::Fallback => write!(f, "FALLBACK"),
            Self::GracefulDegrade => write!(f, "GRACEFUL_DEGRADE"),
            Self::Skip => write!(f, "SKIP"),
            Self::Throw => write!(f, "THROW"),
        }
    }
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// Exponential backoff configuration for the RETRY strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum operation attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Backoff multiplier per retry.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
    /// Delay ceiling.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_backoff_multiplier() -> u32 {
    2
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    ///
    /// Strictly exponential: `min(initial * multiplier^(attempt-1), max)`.
    /// A rate-limit error overrides the first retry delay with its own
    /// `retry_after_ms`, capped at `max_delay_ms`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &TradingError) -> Duration {
        if attempt == 1 {
            if let TradingError::ExchangeRateLimit { retry_after_ms } = error {
                return Duration::from_millis((*retry_after_ms).min(self.max_delay_ms));
            }
        }
        let factor = u64::from(self.backoff_multiplier).saturating_pow(attempt.saturating_sub(1));
        let delay = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

// ============================================================================
// Observer hooks
// ============================================================================

/// Callbacks invoked by the handler around recovery attempts.
///
/// All methods default to no-ops; implement only what you need.
pub trait RecoveryObserver: Send + Sync {
    /// Called before each retry sleep.
    fn on_retry(&self, _attempt: u32, _error: &TradingError, _delay: Duration) {}

    /// Called when an operation is considered recovered.
    fn on_recover(&self, _strategy: RecoveryStrategy, _attempts: u32) {}

    /// Called when an operation is not recovered.
    fn on_failure(&self, _error: &TradingError, _attempts: u32) {}
}

// ============================================================================
// Handled outcome
// ============================================================================

/// How a handled operation resolved.
#[derive(Debug)]
pub enum Recovery<T> {
    /// Operation eventually succeeded (first try or after retries).
    Succeeded(T),
    /// Failure absorbed; caller proceeds on an alternate path.
    Fallback,
    /// Failure absorbed; caller continues with reduced functionality.
    Degraded,
    /// Operation cancelled; caller continues.
    Skipped,
    /// Not recovered; caller must surface the error.
    Failed(TradingError),
}

/// Result of running an operation through the handler.
#[derive(Debug)]
pub struct Handled<T> {
    /// Resolution of the operation.
    pub recovery: Recovery<T>,
    /// Strategy that was applied.
    pub strategy: RecoveryStrategy,
    /// Total operation attempts performed.
    pub attempts: u32,
    /// Wall-clock time spent in the handler.
    pub elapsed: Duration,
    /// The normalized error, whenever any attempt failed — present even on
    /// eventual recovery so callers can record the occurrence.
    pub last_error: Option<TradingError>,
}

impl<T> Handled<T> {
    /// Whether the operation is considered recovered.
    #[must_use]
    pub fn recovered(&self) -> bool {
        !matches!(self.recovery, Recovery::Failed(_))
    }

    /// The terminal error, when not recovered.
    #[must_use]
    pub fn error(&self) -> Option<&TradingError> {
        match &self.recovery {
            Recovery::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Convert into a plain result.
    ///
    /// `Ok(Some(value))` on success, `Ok(None)` when the failure was
    /// absorbed (FALLBACK / GRACEFUL_DEGRADE / SKIP), `Err` otherwise.
    pub fn into_result(self) -> Result<Option<T>, TradingError> {
        match self.recovery {
            Recovery::Succeeded(v) => Ok(Some(v)),
            Recovery::Fallback | Recovery::Degraded | Recovery::Skipped => Ok(None),
            Recovery::Failed(e) => Err(e),
        }
    }
}

// ============================================================================
// ErrorHandler
// ============================================================================

/// Strategy dispatcher for fallible async operations.
pub struct ErrorHandler {
    policy: RetryPolicy,
    observer: Option<Arc<dyn RecoveryObserver>>,
}

impl ErrorHandler {
    /// Create a handler with the given retry policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: None,
        }
    }

    /// Attach an observer for retry/recover/failure callbacks.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RecoveryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Current retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` under the given recovery strategy.
    ///
    /// The operation is always attempted once; the strategy only governs
    /// what happens on failure. Errors are normalized to `TradingError`
    /// before dispatch. This method never panics and never records
    /// telemetry; callers record the outcome into the registry.
    pub async fn run<T, F, Fut>(&self, strategy: RecoveryStrategy, mut op: F) -> Handled<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        let started = Instant::now();

        match op().await {
            Ok(value) => Handled {
                recovery: Recovery::Succeeded(value),
                strategy,
                attempts: 1,
                elapsed: started.elapsed(),
                last_error: None,
            },
            Err(raw) => {
                let error = TradingError::normalize(raw);
                self.dispatch(strategy, error, op, started).await
            }
        }
    }

    async fn dispatch<T, F, Fut>(
        &self,
        strategy: RecoveryStrategy,
        error: TradingError,
        op: F,
        started: Instant,
    ) -> Handled<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        match strategy {
            RecoveryStrategy::Retry => self.retry(error, op, started).await,
            RecoveryStrategy::Fallback => {
                warn!(code = error.code(), error = %error, "Recovering via FALLBACK");
                if let Some(obs) = &self.observer {
                    obs.on_recover(RecoveryStrategy::Fallback, 1);
                }
                Handled {
                    recovery: Recovery::Fallback,
                    strategy,
                    attempts: 1,
                    elapsed: started.elapsed(),
                    last_error: Some(error),
                }
            }
            RecoveryStrategy::GracefulDegrade => {
                warn!(code = error.code(), error = %error, "Continuing with degraded functionality");
                if let Some(obs) = &self.observer {
                    obs.on_recover(RecoveryStrategy::GracefulDegrade, 1);
                }
                Handled {
                    recovery: Recovery::Degraded,
                    strategy,
                    attempts: 1,
                    elapsed: started.elapsed(),
                    last_error: Some(error),
                }
            }
            RecoveryStrategy::Skip => {
                warn!(code = error.code(), error = %error, "Operation skipped");
                if let Some(obs) = &self.observer {
                    obs.on_recover(RecoveryStrategy::Skip, 1);
                }
                Handled {
                    recovery: Recovery::Skipped,
                    strategy,
                    attempts: 1,
                    elapsed: started.elapsed(),
                    last_error: Some(error),
                }
            }
            RecoveryStrategy::Throw => {
                if let Some(obs) = &self.observer {
                    obs.on_failure(&error, 1);
                }
                Handled {
                    recovery: Recovery::Failed(error.clone()),
                    strategy,
                    attempts: 1,
                    elapsed: started.elapsed(),
                    last_error: Some(error),
                }
            }
        }
    }

    async fn retry<T, F, Fut>(
        &self,
        first_error: TradingError,
        mut op: F,
        started: Instant,
    ) -> Handled<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        let mut last_error = first_error;
        let mut attempts: u32 = 1;

        if !last_error.retryable() {
            debug!(code = last_error.code(), "Error not retryable, reporting failure");
            if let Some(obs) = &self.observer {
                obs.on_failure(&last_error, attempts);
            }
            return Handled {
                recovery: Recovery::Failed(last_error.clone()),
                strategy: RecoveryStrategy::Retry,
                attempts,
                elapsed: started.elapsed(),
                last_error: Some(last_error),
            };
        }

        while attempts < self.policy.max_attempts {
            let retry_no = attempts; // 1-based retry index
            let delay = self.policy.delay_for(retry_no, &last_error);

            if let Some(obs) = &self.observer {
                obs.on_retry(retry_no, &last_error, delay);
            }
            debug!(
                attempt = retry_no,
                delay_ms = delay.as_millis() as u64,
                code = last_error.code(),
                "Retrying after backoff"
            );
            tokio::time::sleep(delay).await;

            attempts += 1;
            match op().await {
                Ok(value) => {
                    if let Some(obs) = &self.observer {
                        obs.on_recover(RecoveryStrategy::Retry, attempts);
                    }
                    return Handled {
                        recovery: Recovery::Succeeded(value),
                        strategy: RecoveryStrategy::Retry,
                        attempts,
                        elapsed: started.elapsed(),
                        last_error: Some(last_error),
                    };
                }
                Err(raw) => {
                    last_error = TradingError::normalize(raw);
                }
            }
        }

        if let Some(obs) = &self.observer {
            obs.on_failure(&last_error, attempts);
        }
        Handled {
            recovery: Recovery::Failed(last_error.clone()),
            strategy: RecoveryStrategy::Retry,
            attempts,
            elapsed: started.elapsed(),
            last_error: Some(last_error),
        }
    }
}
