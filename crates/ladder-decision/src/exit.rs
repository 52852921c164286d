//! Exit decision state machine.
//!
//! `evaluate_exit` turns (position, price, lifecycle state) into the next
//! state plus an ordered list of exit actions. The function is pure: the
//! caller persists the returned state and executes the actions.
//!
//! # Decision order
//!
//! 1. Input validation (fail-safe: any invalid input closes the position)
//! 2. Stop-loss check — from any non-terminal state, ahead of TP progression
//! 3. Take-profit ladder progression, gated by the current state
//! 4. No condition met → state unchanged

use ladder_core::{ExitIndicators, Position, PositionState, Price, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Share of the position closed at each ladder level, in percent.
const TP1_CLOSE_PERCENT: Decimal = dec!(50);
const TP2_CLOSE_PERCENT: Decimal = dec!(30);
const TP3_CLOSE_PERCENT: Decimal = dec!(20);

/// ATR clamp bounds for the smart trailing distance, in percent.
const MIN_TRAILING_ATR_PERCENT: Decimal = dec!(1.5);
const MAX_TRAILING_ATR_PERCENT: Decimal = dec!(3.0);

/// Volume ratio above which the trailing distance is tightened.
const HIGH_VOLUME_RATIO: Decimal = dec!(1.2);

/// Tightening factor applied on high volume.
const HIGH_VOLUME_TIGHTEN: Decimal = dec!(0.8);

// ============================================================================
// Config and context
// ============================================================================

/// Tunables for the exit state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitConfig {
    /// Margin added to entry when moving the stop to breakeven, in percent.
    #[serde(default = "default_breakeven_margin_percent")]
    pub breakeven_margin_percent: Decimal,
    /// Minimum distance between price and stop, in percent.
    #[serde(default = "default_min_sl_distance_percent")]
    pub min_sl_distance_percent: Decimal,
    /// Base trailing distance, in percent of price.
    #[serde(default = "default_trailing_distance_percent")]
    pub trailing_distance_percent: Decimal,
    /// Protect the TP3 runner with a trailing stop on high-volume fills.
    #[serde(default)]
    pub adaptive_tp3: bool,
}

fn default_breakeven_margin_percent() -> Decimal {
    dec!(0.1)
}

fn default_min_sl_distance_percent() -> Decimal {
    dec!(0.5)
}

fn default_trailing_distance_percent() -> Decimal {
    dec!(1.5)
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            breakeven_margin_percent: default_breakeven_margin_percent(),
            min_sl_distance_percent: default_min_sl_distance_percent(),
            trailing_distance_percent: default_trailing_distance_percent(),
            adaptive_tp3: false,
        }
    }
}

/// Input bundle for `evaluate_exit`.
///
/// Optional fields model upstream data that may be missing at call time;
/// the state machine degrades to a close decision instead of panicking.
#[derive(Debug, Clone)]
pub struct ExitContext<'a> {
    /// The position under evaluation.
    pub position: Option<&'a Position>,
    /// Latest market price.
    pub current_price: Option<Price>,
    /// Lifecycle state tracked by the caller.
    pub current_state: Option<PositionState>,
    /// Optional indicator snapshot for the smart trailing distance.
    pub indicators: Option<&'a ExitIndicators>,
    /// Tunables.
    pub config: ExitConfig,
}

// ============================================================================
// Decision output
// ============================================================================

/// One exit action for the orchestrator to execute, in order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExitAction {
    /// Close the full remaining position.
    CloseAll,
    /// Close the given percentage of the remaining position.
    ClosePercent(Decimal),
    /// Move the stop-loss to the given price.
    UpdateStopLoss(Price),
    /// Activate trailing at the given absolute price distance.
    ActivateTrailing(Price),
}

/// Why a (partial) closure was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClosureReason {
    SlHit,
    Tp1Hit,
    Tp2Hit,
    Tp3Hit,
    InvalidInput,
}

impl std::fmt::Display for ClosureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SlHit => write!(f, "SL_HIT"),
            Self::Tp1Hit => write!(f, "TP1_HIT"),
            Self::Tp2Hit => write!(f, "TP2_HIT"),
            Self::Tp3Hit => write!(f, "TP3_HIT"),
            Self::InvalidInput => write!(f, "INVALID_INPUT"),
        }
    }
}

/// Supplemental decision data for journaling and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExitMetadata {
    /// Closure reason code.
    pub closure_reason: Option<ClosureReason>,
    /// PnL in percent of entry at the trigger price.
    pub profit_percent: Option<Decimal>,
    /// Absolute PnL in quote currency at the trigger price.
    pub profit_abs: Option<Decimal>,
    /// Price that triggered the decision.
    pub trigger_price: Option<Price>,
}

/// Result of one exit evaluation. Created fresh on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitDecision {
    /// Next lifecycle state to persist.
    pub state: PositionState,
    /// Actions to execute, in order.
    pub actions: Vec<ExitAction>,
    /// Human-readable reason.
    pub reason: String,
    /// Transition description, e.g. "OPEN → TP1_HIT".
    pub state_transition: String,
    /// Optional metadata.
    pub metadata: Option<ExitMetadata>,
}

impl ExitDecision {
    fn no_change(state: PositionState, reason: impl Into<String>) -> Self {
        Self {
            state,
            actions: Vec::new(),
            reason: reason.into(),
            state_transition: format!("{state} → NO_CHANGE"),
            metadata: None,
        }
    }

    fn fail_safe(from: &str, reason: impl Into<String>) -> Self {
        Self {
            state: PositionState::Closed,
            actions: vec![ExitAction::CloseAll],
            reason: reason.into(),
            state_transition: format!("{from} → CLOSED"),
            metadata: Some(ExitMetadata {
                closure_reason: Some(ClosureReason::InvalidInput),
                ..Default::default()
            }),
        }
    }
}

// ============================================================================
// evaluate_exit
// ============================================================================

/// Evaluate the exit state machine for one price update.
///
/// Pure and total: never panics, never mutates its inputs, and returns a
/// fail-safe close decision for any invalid input.
#[must_use]
pub fn evaluate_exit(ctx: &ExitContext<'_>) -> ExitDecision {
    // Fail-fast validation, highest priority first.
    let Some(position) = ctx.position else {
        return ExitDecision::fail_safe("UNKNOWN", "Position is required");
    };
    let Some(price) = ctx.current_price else {
        return ExitDecision::fail_safe("UNKNOWN", "Current price is required");
    };
    if !price.is_positive() {
        return ExitDecision::fail_safe("UNKNOWN", "Invalid current price");
    }
    let Some(state) = ctx.current_state else {
        return ExitDecision::fail_safe("UNKNOWN", "Current state is required");
    };

    // Terminal state: nothing left to decide.
    if state.is_terminal() {
        return ExitDecision::no_change(state, "Position already closed");
    }

    // Stop-loss takes priority over TP progression from any live state.
    if stop_loss_hit(position, price) {
        return close_on_stop(position, price, state);
    }

    // TP ladder progression, gated by the current state. A missing ladder
    // index simply never advances.
    match state {
        PositionState::Open => {
            if tp_reached(position, price, 0) {
                return tp1_decision(position, price, &ctx.config);
            }
        }
        PositionState::Tp1Hit => {
            if tp_reached(position, price, 1) {
                return tp2_decision(position, price, ctx.indicators, &ctx.config);
            }
        }
        PositionState::Tp2Hit => {
            if tp_reached(position, price, 2) {
                return tp3_decision(position, price, ctx.indicators, &ctx.config);
            }
        }
        PositionState::Tp3Hit => {
            return ExitDecision {
                state: PositionState::Tp3Hit,
                actions: Vec::new(),
                reason: "Fully laddered, awaiting stop loss or manual close".to_string(),
                state_transition: "TP3_HIT → HOLDING".to_string(),
                metadata: None,
            };
        }
        // Unreachable in practice (terminal states return above); kept as a
        // non-panicking arm so the function stays total.
        PositionState::Closed => {
            return ExitDecision::no_change(state, "Position already closed");
        }
    }

    ExitDecision::no_change(state, "No exit condition met")
}

/// Stop-loss trigger check. Equality counts as a hit.
fn stop_loss_hit(position: &Position, price: Price) -> bool {
    match position.side {
        Side::Long => price <= position.stop_loss.price,
        Side::Short => price >= position.stop_loss.price,
    }
}

/// Take-profit trigger check for ladder index `idx`.
///
/// LONG: reached when price >= tp. SHORT: reached when price <= tp.
/// A missing index is treated as not reached.
fn tp_reached(position: &Position, price: Price, idx: usize) -> bool {
    match position.take_profits.get(idx) {
        Some(tp) => match position.side {
            Side::Long => price >= tp.price,
            Side::Short => price <= tp.price,
        },
        None => false,
    }
}

fn close_on_stop(position: &Position, price: Price, from: PositionState) -> ExitDecision {
    let pnl_pct = position.pnl_percent(price);
    ExitDecision {
        state: PositionState::Closed,
        actions: vec![ExitAction::CloseAll],
        reason: format!("Stop loss hit at {price} ({pnl_pct:.2}%)"),
        state_transition: format!("{from} → CLOSED"),
        metadata: Some(ExitMetadata {
            closure_reason: Some(ClosureReason::SlHit),
            profit_percent: Some(pnl_pct),
            profit_abs: Some(position.pnl_abs(price)),
            trigger_price: Some(price),
        }),
    }
}

fn tp1_decision(position: &Position, price: Price, config: &ExitConfig) -> ExitDecision {
    let breakeven = breakeven_price(position, price, config);
    ExitDecision {
        state: PositionState::Tp1Hit,
        actions: vec![
            ExitAction::ClosePercent(TP1_CLOSE_PERCENT),
            ExitAction::UpdateStopLoss(breakeven),
        ],
        reason: format!("TP1 reached at {price}, stop moved to breakeven"),
        state_transition: "OPEN → TP1_HIT".to_string(),
        metadata: Some(ExitMetadata {
            closure_reason: Some(ClosureReason::Tp1Hit),
            profit_percent: Some(position.pnl_percent(price)),
            profit_abs: Some(position.pnl_abs(price)),
            trigger_price: Some(price),
        }),
    }
}

fn tp2_decision(
    position: &Position,
    price: Price,
    indicators: Option<&ExitIndicators>,
    config: &ExitConfig,
) -> ExitDecision {
    let distance = trailing_distance(price, indicators, config);
    ExitDecision {
        state: PositionState::Tp2Hit,
        actions: vec![
            ExitAction::ClosePercent(TP2_CLOSE_PERCENT),
            ExitAction::ActivateTrailing(distance),
        ],
        reason: format!("TP2 reached at {price}, trailing activated"),
        state_transition: "TP1_HIT → TP2_HIT".to_string(),
        metadata: Some(ExitMetadata {
            closure_reason: Some(ClosureReason::Tp2Hit),
            profit_percent: Some(position.pnl_percent(price)),
            profit_abs: Some(position.pnl_abs(price)),
            trigger_price: Some(price),
        }),
    }
}

fn tp3_decision(
    position: &Position,
    price: Price,
    indicators: Option<&ExitIndicators>,
    config: &ExitConfig,
) -> ExitDecision {
    let mut actions = vec![ExitAction::ClosePercent(TP3_CLOSE_PERCENT)];

    // Runner protection: on a high-volume TP3 fill, trail the remainder.
    if config.adaptive_tp3 {
        let high_volume = indicators
            .and_then(ExitIndicators::volume_ratio)
            .is_some_and(|r| r > HIGH_VOLUME_RATIO);
        if high_volume {
            actions.push(ExitAction::ActivateTrailing(trailing_distance(
                price, indicators, config,
            )));
        }
    }

    ExitDecision {
        state: PositionState::Tp3Hit,
        actions,
        reason: format!("TP3 reached at {price}"),
        state_transition: "TP2_HIT → TP3_HIT".to_string(),
        metadata: Some(ExitMetadata {
            closure_reason: Some(ClosureReason::Tp3Hit),
            profit_percent: Some(position.pnl_percent(price)),
            profit_abs: Some(position.pnl_abs(price)),
            trigger_price: Some(price),
        }),
    }
}

/// Breakeven stop price: entry plus a small margin in the profit direction.
///
/// The stop is kept at least `min_sl_distance_percent` away from the
/// current price; exchanges reject stops placed closer than that.
fn breakeven_price(position: &Position, price: Price, config: &ExitConfig) -> Price {
    let margin = match position.side {
        Side::Long => config.breakeven_margin_percent,
        Side::Short => -config.breakeven_margin_percent,
    };
    let raw = position.entry_price.offset_pct(margin);
    match position.side {
        Side::Long => {
            let cap = price.offset_pct(-config.min_sl_distance_percent);
            if raw > cap {
                cap
            } else {
                raw
            }
        }
        Side::Short => {
            let floor = price.offset_pct(config.min_sl_distance_percent);
            if raw < floor {
                floor
            } else {
                raw
            }
        }
    }
}

/// Smart trailing distance as an absolute price offset.
///
/// Base percent comes from config. When an ATR reading is available it
/// replaces the base, clamped to [1.5, 3.0] percent; on high volume
/// (ratio > 1.2) the ATR-derived distance is tightened by 0.8.
fn trailing_distance(
    price: Price,
    indicators: Option<&ExitIndicators>,
    config: &ExitConfig,
) -> Price {
    let mut percent = config.trailing_distance_percent;

    if let Some(ind) = indicators {
        if let Some(atr) = ind.atr_percent {
            if atr > Decimal::ZERO {
                percent = atr.clamp(MIN_TRAILING_ATR_PERCENT, MAX_TRAILING_ATR_PERCENT);
                if ind.volume_ratio().is_some_and(|r| r > HIGH_VOLUME_RATIO) {
                    percent *= HIGH_VOLUME_TIGHTEN;
                }
            }
        }
    }

    Price::new(price.inner() * percent / Decimal::from(100))
}

// ============================================================================
// Tests
// ============================================================================
