//! Position, stop-loss and take-profit ladder types.
//!
//! A `Position` is owned by the orchestration layer. Decision code receives
//! it by reference and never mutates it; state transitions are returned as
//! values and applied by the owner.

use crate::{Price, Qty};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short. Used in signed PnL math.
    #[must_use]
    pub fn sign(&self) -> Decimal {
        match self {
            Self::Long => Decimal::ONE,
            Self::Short => -Decimal::ONE,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Position lifecycle status as seen by the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Exit lifecycle state of a position.
///
/// Strictly forward-progressing: OPEN → TP1_HIT → TP2_HIT → TP3_HIT.
/// CLOSED is reachable from any state (stop-loss or manual close) and is
/// terminal. No API in this workspace produces a backward transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionState {
    Open,
    Tp1Hit,
    Tp2Hit,
    Tp3Hit,
    Closed,
}

impl PositionState {
    /// Check if this state is terminal (no further transitions).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Monotonic rank for forward-progress assertions.
    #[must_use]
    pub fn progress_rank(&self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Tp1Hit => 1,
            Self::Tp2Hit => 2,
            Self::Tp3Hit => 3,
            Self::Closed => 4,
        }
    }

    /// Index into the take-profit ladder that this state is waiting on.
    ///
    /// Returns None for TP3_HIT (fully laddered) and CLOSED.
    #[must_use]
    pub fn next_tp_index(&self) -> Option<usize> {
        match self {
            Self::Open => Some(0),
            Self::Tp1Hit => Some(1),
            Self::Tp2Hit => Some(2),
            Self::Tp3Hit | Self::Closed => None,
        }
    }
}

impl std::fmt::Display for PositionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Tp1Hit => write!(f, "TP1_HIT"),
            Self::Tp2Hit => write!(f, "TP2_HIT"),
            Self::Tp3Hit => write!(f, "TP3_HIT"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Stop-loss attached to a position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopLoss {
    /// Current stop price.
    pub price: Price,
    /// Stop price at position open (before breakeven/trailing moves).
    pub initial_price: Price,
    /// Whether the stop has been moved to breakeven.
    pub is_breakeven: bool,
    /// Whether trailing is active.
    pub is_trailing: bool,
    /// Timestamp of the last stop update.
    pub updated_at: DateTime<Utc>,
}

impl StopLoss {
    /// Create a fresh stop-loss at the given price.
    #[must_use]
    pub fn new(price: Price) -> Self {
        Self {
            price,
            initial_price: price,
            is_breakeven: false,
            is_trailing: false,
            updated_at: Utc::now(),
        }
    }
}

/// One rung of the take-profit ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfit {
    /// Ladder level, 1-based.
    pub level: u8,
    /// Trigger price.
    pub price: Price,
    /// Distance from entry in percent (signed by side convention).
    pub percent_from_entry: Decimal,
    /// Fraction of the position to close at this level, in percent.
    pub size_percent: Decimal,
    /// Whether this level has already been filled.
    pub hit: bool,
}

impl TakeProfit {
    #[must_use]
    pub fn new(level: u8, price: Price, percent_from_entry: Decimal, size_percent: Decimal) -> Self {
        Self {
            level,
            price,
            percent_from_entry,
            size_percent,
            hit: false,
        }
    }
}

/// Check the take-profit ladder invariant.
///
/// Levels must be ordered by level number with prices ascending for LONG
/// and descending for SHORT, and size percentages must sum to at most 100.
#[must_use]
pub fn ladder_is_ordered(side: Side, take_profits: &[TakeProfit]) -> bool {
    let prices_ok = take_profits.windows(2).all(|w| match side {
        Side::Long => w[0].price < w[1].price,
        Side::Short => w[0].price > w[1].price,
    });
    let levels_ok = take_profits.windows(2).all(|w| w[0].level < w[1].level);
    let total_size: Decimal = take_profits.iter().map(|tp| tp.size_percent).sum();
    prices_ok && levels_ok && total_size <= Decimal::from(100)
}

/// A live trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Unique position id.
    pub id: String,
    /// Trading symbol (e.g., "BTCUSDT").
    pub symbol: String,
    /// Position side.
    pub side: Side,
    /// Average entry price.
    pub entry_price: Price,
    /// Position quantity (always positive).
    pub quantity: Qty,
    /// Leverage multiplier.
    pub leverage: u32,
    /// Margin allocated to this position, in USDT.
    pub margin_usdt: Decimal,
    /// Attached stop-loss.
    pub stop_loss: StopLoss,
    /// Take-profit ladder, ordered by level.
    pub take_profits: Vec<TakeProfit>,
    /// Timestamp when the position was opened.
    pub opened_at: DateTime<Utc>,
    /// Unrealized PnL in USDT at the last mark.
    pub unrealized_pnl: Decimal,
    /// Exchange order id of the entry order, if known.
    pub order_id: Option<String>,
    /// Human-readable entry reason.
    pub reason: String,
    /// Lifecycle status.
    pub status: PositionStatus,
}

impl Position {
    /// Create a new open position with a generated id.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        entry_price: Price,
        quantity: Qty,
        leverage: u32,
        margin_usdt: Decimal,
        stop_loss: StopLoss,
        take_profits: Vec<TakeProfit>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            side,
            entry_price,
            quantity,
            leverage,
            margin_usdt,
            stop_loss,
            take_profits,
            opened_at: Utc::now(),
            unrealized_pnl: Decimal::ZERO,
            order_id: None,
            reason: reason.into(),
            status: PositionStatus::Open,
        }
    }

    /// PnL in percent of entry price at the given mark.
    ///
    /// LONG: `(current - entry) / entry * 100`.
    /// SHORT: `(entry - current) / entry * 100`.
    /// Returns zero when the entry price is zero (degenerate input).
    #[must_use]
    pub fn pnl_percent(&self, current: Price) -> Decimal {
        let entry = self.entry_price.inner();
        if entry.is_zero() {
            return Decimal::ZERO;
        }
        self.side.sign() * (current.inner() - entry) / entry * Decimal::from(100)
    }

    /// Absolute PnL in quote currency at the given mark.
    #[must_use]
    pub fn pnl_abs(&self, current: Price) -> Decimal {
        self.side.sign() * (current.inner() - self.entry_price.inner()) * self.quantity.inner()
    }

    /// Notional value at entry.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.quantity.notional(self.entry_price)
    }

    #[must_use]
    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    #[must_use]
    pub fn is_short(&self) -> bool {
        self.side == Side::Short
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ladder(prices: &[Decimal], side: Side) -> Vec<TakeProfit> {
        let sizes = [dec!(50), dec!(30), dec!(20)];
        prices
            .iter()
            .zip(sizes.iter())
            .enumerate()
            .map(|(i, (p, s))| TakeProfit::new(i as u8 + 1, Price::new(*p), Decimal::ZERO, *s))
            .map(|mut tp| {
                tp.percent_from_entry = match side {
                    Side::Long => dec!(1),
                    Side::Short => dec!(-1),
                };
                tp
            })
            .collect()
    }

    fn long_position() -> Position {
        Position::new(
            "BTCUSDT",
            Side::Long,
            Price::new(dec!(100)),
            Qty::new(dec!(1)),
            5,
            dec!(20),
            StopLoss::new(Price::new(dec!(99))),
            ladder(&[dec!(101), dec!(102), dec!(105)], Side::Long),
            "test entry",
        )
    }

    #[test]
    fn test_pnl_percent_long() {
        let pos = long_position();
        assert_eq!(pos.pnl_percent(Price::new(dec!(101))), dec!(1));
        assert_eq!(pos.pnl_percent(Price::new(dec!(98))), dec!(-2));
    }

    #[test]
    fn test_pnl_percent_short() {
        let mut pos = long_position();
        pos.side = Side::Short;
        assert_eq!(pos.pnl_percent(Price::new(dec!(99))), dec!(1));
        assert_eq!(pos.pnl_percent(Price::new(dec!(102))), dec!(-2));
    }

    #[test]
    fn test_pnl_percent_zero_entry_degrades() {
        let mut pos = long_position();
        pos.entry_price = Price::ZERO;
        assert_eq!(pos.pnl_percent(Price::new(dec!(100))), Decimal::ZERO);
    }

    #[test]
    fn test_state_progress_rank_monotonic() {
        let states = [
            PositionState::Open,
            PositionState::Tp1Hit,
            PositionState::Tp2Hit,
            PositionState::Tp3Hit,
            PositionState::Closed,
        ];
        for w in states.windows(2) {
            assert!(w[0].progress_rank() < w[1].progress_rank());
        }
        assert!(PositionState::Closed.is_terminal());
        assert!(!PositionState::Tp3Hit.is_terminal());
    }

    #[test]
    fn test_next_tp_index() {
        assert_eq!(PositionState::Open.next_tp_index(), Some(0));
        assert_eq!(PositionState::Tp1Hit.next_tp_index(), Some(1));
        assert_eq!(PositionState::Tp2Hit.next_tp_index(), Some(2));
        assert_eq!(PositionState::Tp3Hit.next_tp_index(), None);
        assert_eq!(PositionState::Closed.next_tp_index(), None);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PositionState::Open.to_string(), "OPEN");
        assert_eq!(PositionState::Tp1Hit.to_string(), "TP1_HIT");
        assert_eq!(PositionState::Closed.to_string(), "CLOSED");
    }

    #[test]
    fn test_ladder_ordered_long() {
        let tps = ladder(&[dec!(101), dec!(102), dec!(105)], Side::Long);
        assert!(ladder_is_ordered(Side::Long, &tps));
        assert!(!ladder_is_ordered(Side::Short, &tps));
    }

    #[test]
    fn test_ladder_ordered_short() {
        let tps = ladder(&[dec!(99), dec!(98), dec!(95)], Side::Short);
        assert!(ladder_is_ordered(Side::Short, &tps));
    }

    #[test]
    fn test_ladder_size_sum_capped() {
        let mut tps = ladder(&[dec!(101), dec!(102), dec!(105)], Side::Long);
        tps[2].size_percent = dec!(30); // 50 + 30 + 30 > 100
        assert!(!ladder_is_ordered(Side::Long, &tps));
    }

    #[test]
    fn test_empty_ladder_is_valid() {
        assert!(ladder_is_ordered(Side::Long, &[]));
    }
}
