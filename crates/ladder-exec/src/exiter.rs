//! Exit and entry orchestration.
//!
//! `PositionExiter` applies an `ExitDecision` against the live exchange:
//! every exchange call is wrapped with RETRY, the journal with FALLBACK
//! (journal outage must never block a close), the notifier with SKIP
//! (best-effort). Every handled failure is recorded into the error
//! registry with its recovery outcome.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};

use ladder_core::{Position, PositionState, Price, Qty, Side, Signal, SignalDirection, StopLoss, TakeProfit};
use ladder_decision::{ClosureReason, ExitAction, ExitDecision};
use ladder_error::{
    BoxError, ErrorHandler, Handled, Recovery, RecoveryStrategy, TradingError,
};
use ladder_risk::{RiskManager, TradeResult};
use ladder_telemetry::ErrorRegistry;

use crate::client::{
    ExchangeClient, Notifier, OpenPositionRequest, TradeCloseRecord, TradeJournal,
};
use crate::error::{ExecError, ExecResult};
use crate::exit_lock::ExitLockMap;

/// Ladder close fractions applied when building a position from a signal.
const LADDER_SIZE_PERCENTS: [Decimal; 3] = [dec!(50), dec!(30), dec!(20)];

// ============================================================================
// PositionExiter
// ============================================================================

/// Outcome of executing one exit decision.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitOutcome {
    /// Position the decision was executed for.
    pub position_id: String,
    /// State persisted after execution.
    pub state: PositionState,
    /// Number of exchange actions executed.
    pub executed_actions: usize,
    /// Whether the close was journaled (false = journal fell back).
    pub journaled: bool,
    /// Whether the alert was delivered (false = skipped).
    pub notified: bool,
}

/// Executes exit decisions against the exchange under a per-position lock.
pub struct PositionExiter {
    exchange: Arc<dyn ExchangeClient>,
    journal: Arc<dyn TradeJournal>,
    notifier: Arc<dyn Notifier>,
    handler: ErrorHandler,
    registry: Arc<ErrorRegistry>,
    locks: ExitLockMap,
}

impl PositionExiter {
    #[must_use]
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        journal: Arc<dyn TradeJournal>,
        notifier: Arc<dyn Notifier>,
        handler: ErrorHandler,
        registry: Arc<ErrorRegistry>,
    ) -> Self {
        Self {
            exchange,
            journal,
            notifier,
            handler,
            registry,
            locks: ExitLockMap::new(),
        }
    }

    /// Whether an exit is currently in flight for the position.
    #[must_use]
    pub fn is_exiting(&self, position_id: &str) -> bool {
        self.locks.is_locked(position_id)
    }

    /// Execute the actions of an exit decision.
    ///
    /// Acquires the per-position lock first; a second caller arriving while
    /// an exit is in flight gets `ExecError::ExitInProgress`. The lock is
    /// released on every path, including failures, via the guard's drop.
    ///
    /// A failed exchange action (after retries) aborts the remaining
    /// actions and surfaces the error. Journal and notification failures
    /// never abort a close.
    pub async fn execute(
        &self,
        position: &Position,
        decision: &ExitDecision,
    ) -> ExecResult<ExitOutcome> {
        if decision.actions.is_empty() {
            return Ok(ExitOutcome {
                position_id: position.id.clone(),
                state: decision.state,
                executed_actions: 0,
                journaled: false,
                notified: false,
            });
        }

        let _guard = self
            .locks
            .try_acquire(&position.id)
            .ok_or_else(|| ExecError::ExitInProgress {
                position_id: position.id.clone(),
            })?;

        info!(
            position_id = %position.id,
            symbol = %position.symbol,
            transition = %decision.state_transition,
            actions = decision.actions.len(),
            "Executing exit decision"
        );

        let mut executed = 0usize;
        for action in &decision.actions {
            self.apply_action(position, decision, action).await?;
            executed += 1;
        }

        let mut journaled = false;
        let mut notified = false;
        if decision.state == PositionState::Closed {
            // Leftover conditional orders are secondary: retry, but a
            // persistent failure must not undo the close.
            let cleanup = self
                .handler
                .run(RecoveryStrategy::Retry, || {
                    self.exchange.cancel_all_conditional_orders(&position.symbol)
                })
                .await;
            self.record(&cleanup);
            if !cleanup.recovered() {
                warn!(
                    position_id = %position.id,
                    "Conditional order cleanup failed after close, continuing"
                );
            }

            journaled = self.journal_close(position, decision).await;
            notified = self.notify_close(position, decision).await;
        }

        Ok(ExitOutcome {
            position_id: position.id.clone(),
            state: decision.state,
            executed_actions: executed,
            journaled,
            notified,
        })
    }

    async fn apply_action(
        &self,
        position: &Position,
        decision: &ExitDecision,
        action: &ExitAction,
    ) -> ExecResult<()> {
        match action {
            ExitAction::CloseAll => {
                self.with_retry(|| self.exchange.close_position(&position.id, dec!(100)))
                    .await
            }
            ExitAction::ClosePercent(percent) => {
                self.with_retry(|| self.exchange.close_position(&position.id, *percent))
                    .await
            }
            ExitAction::UpdateStopLoss(new_stop) => {
                self.with_retry(|| self.exchange.update_stop_loss(&position.id, *new_stop, false))
                    .await
            }
            ExitAction::ActivateTrailing(distance) => {
                // The exchange boundary has no dedicated trailing call; a
                // trailing stop is an updated stop at the anchor price
                // offset by the distance, with the trailing flag set.
                let anchor = decision
                    .metadata
                    .as_ref()
                    .and_then(|m| m.trigger_price)
                    .unwrap_or(position.entry_price);
                let new_stop = match position.side {
                    Side::Long => Price::new(anchor.inner() - distance.inner()),
                    Side::Short => Price::new(anchor.inner() + distance.inner()),
                };
                self.with_retry(|| self.exchange.update_stop_loss(&position.id, new_stop, true))
                    .await
            }
        }
    }

    async fn journal_close(&self, position: &Position, decision: &ExitDecision) -> bool {
        let metadata = decision.metadata.unwrap_or_default();
        let record = TradeCloseRecord {
            position_id: position.id.clone(),
            symbol: position.symbol.clone(),
            side: position.side,
            realized_pnl: metadata.profit_abs.unwrap_or(Decimal::ZERO),
            pnl_percent: metadata.profit_percent.unwrap_or(Decimal::ZERO),
            closure_reason: metadata
                .closure_reason
                .unwrap_or(ClosureReason::InvalidInput)
                .to_string(),
            closed_at: Utc::now(),
        };

        let handled = self
            .handler
            .run(RecoveryStrategy::Fallback, || {
                self.journal.record_trade_close(&record)
            })
            .await;
        self.record(&handled);

        match handled.recovery {
            Recovery::Succeeded(rollback) => {
                debug!(entry_id = %rollback.entry_id, "Trade close journaled");
                true
            }
            _ => {
                warn!(position_id = %position.id, "Journal unavailable, close proceeds unjournaled");
                false
            }
        }
    }

    async fn notify_close(&self, position: &Position, decision: &ExitDecision) -> bool {
        let message = format!(
            "{} {} closed: {}",
            position.symbol, position.side, decision.reason
        );
        let handled = self
            .handler
            .run(RecoveryStrategy::Skip, || self.notifier.send_alert(&message))
            .await;
        self.record(&handled);
        matches!(handled.recovery, Recovery::Succeeded(()))
    }

    /// Run an exchange call with RETRY and surface terminal failures.
    async fn with_retry<T, F, Fut>(&self, op: F) -> ExecResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, BoxError>>,
    {
        let handled = self.handler.run(RecoveryStrategy::Retry, op).await;
        self.record(&handled);
        match handled.recovery {
            Recovery::Succeeded(value) => Ok(value),
            Recovery::Failed(error) => Err(ExecError::Exchange(error)),
            // RETRY never resolves to an absorbed variant; keep the arm
            // total instead of panicking.
            _ => Err(ExecError::Exchange(TradingError::Unknown {
                message: "retry resolved to an absorbed recovery".to_string(),
            })),
        }
    }

    /// Record a handled outcome into the registry when an error occurred.
    fn record<T>(&self, handled: &Handled<T>) {
        if let Some(error) = &handled.last_error {
            self.registry.record(
                error,
                handled.recovered(),
                Some(handled.elapsed.as_millis() as u64),
            );
        }
    }
}

// ============================================================================
// EntryExecutor
// ============================================================================

/// Outcome of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    /// Position opened.
    Opened(Position),
    /// Risk manager rejected the entry (business outcome, not an error).
    Rejected { reason: String },
}

/// Gates entries through the risk manager and places opening orders.
pub struct EntryExecutor {
    exchange: Arc<dyn ExchangeClient>,
    risk: Arc<TokioMutex<RiskManager>>,
    handler: ErrorHandler,
    registry: Arc<ErrorRegistry>,
}

impl EntryExecutor {
    #[must_use]
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        risk: Arc<TokioMutex<RiskManager>>,
        handler: ErrorHandler,
        registry: Arc<ErrorRegistry>,
    ) -> Self {
        Self {
            exchange,
            risk,
            handler,
            registry,
        }
    }

    /// Attempt to open a position for a signal.
    ///
    /// Contract violations (HOLD signal, malformed signal) raise; risk
    /// rejections come back as `EntryOutcome::Rejected`.
    pub async fn try_open(
        &self,
        symbol: &str,
        signal: &Signal,
        account_balance: Decimal,
        open_positions: &[Position],
    ) -> ExecResult<EntryOutcome> {
        let side = match signal.direction {
            SignalDirection::Long => Side::Long,
            SignalDirection::Short => Side::Short,
            SignalDirection::Hold => {
                return Err(ExecError::InvalidSignal {
                    reason: "HOLD signal cannot open a position".to_string(),
                })
            }
        };

        let (decision, leverage) = {
            let mut risk = self.risk.lock().await;
            let leverage = risk.config().sizing.max_leverage;
            let decision = risk
                .can_trade(signal, account_balance, open_positions)
                .await
                .map_err(|e| ExecError::InvalidSignal {
                    reason: e.to_string(),
                })?;
            (decision, leverage)
        };

        if !decision.allowed {
            let reason = decision
                .reason
                .unwrap_or_else(|| "Risk check failed".to_string());
            debug!(symbol, reason = %reason, "Entry rejected by risk manager");
            return Ok(EntryOutcome::Rejected { reason });
        }
        let Some(size_usdt) = decision.adjusted_position_size else {
            return Ok(EntryOutcome::Rejected {
                reason: "Risk manager produced no position size".to_string(),
            });
        };

        let request = OpenPositionRequest {
            symbol: symbol.to_string(),
            side,
            price: signal.price,
            size_usdt,
            leverage,
            stop_loss: signal.stop_loss,
            take_profits: signal.take_profits.clone(),
        };

        let handled = self
            .handler
            .run(RecoveryStrategy::Retry, || {
                self.exchange.open_position(&request)
            })
            .await;
        if let Some(error) = &handled.last_error {
            self.registry.record(
                error,
                handled.recovered(),
                Some(handled.elapsed.as_millis() as u64),
            );
        }
        let order_id = match handled.recovery {
            Recovery::Succeeded(id) => id,
            Recovery::Failed(error) => return Err(ExecError::Exchange(error)),
            _ => {
                return Err(ExecError::Exchange(TradingError::Unknown {
                    message: "retry resolved to an absorbed recovery".to_string(),
                }))
            }
        };

        let mut position = build_position(symbol, side, signal, size_usdt, leverage);
        position.order_id = Some(order_id);

        info!(
            position_id = %position.id,
            symbol,
            side = %side,
            size_usdt = %size_usdt,
            "Position opened"
        );
        Ok(EntryOutcome::Opened(position))
    }

    /// Feed a closed trade back into the session risk state.
    pub async fn record_trade_result(&self, trade: &TradeResult) {
        self.risk.lock().await.record_trade_result(trade);
    }
}

/// Build the locally tracked position for a filled entry.
fn build_position(
    symbol: &str,
    side: Side,
    signal: &Signal,
    size_usdt: Decimal,
    leverage: u32,
) -> Position {
    let notional = size_usdt * Decimal::from(leverage);
    let quantity = if signal.price.is_positive() {
        Qty::new(notional / signal.price.inner())
    } else {
        Qty::ZERO
    };

    let take_profits = signal
        .take_profits
        .iter()
        .take(LADDER_SIZE_PERCENTS.len())
        .enumerate()
        .map(|(i, price)| {
            TakeProfit::new(
                i as u8 + 1,
                *price,
                price.pct_from(signal.price).unwrap_or(Decimal::ZERO),
                LADDER_SIZE_PERCENTS[i],
            )
        })
        .collect();

    Position::new(
        symbol,
        side,
        signal.price,
        quantity,
        leverage,
        size_usdt,
        StopLoss::new(signal.stop_loss),
        take_profits,
        signal.reason.clone(),
    )
}
