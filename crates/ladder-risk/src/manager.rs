//! Stateful risk gatekeeper.
//!
//! One `RiskManager` instance serializes all risk decisions for a trading
//! session. The rolling daily state is reset when the UTC day changes and
//! is mutated only by `record_trade_result` (and the day roll itself).
//!
//! `can_trade` distinguishes two failure shapes deliberately:
//! - a malformed signal is a caller bug and raises `RiskError::Validation`;
//! - expected operational conditions (limit breaches, bad balance) come
//!   back as `RiskDecision { allowed: false, .. }` with a reason naming the
//!   specific limit.

use chrono::{DateTime, NaiveDate, Utc};
use ladder_core::{Position, Signal};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::RiskManagerConfig;
use crate::error::{RiskError, RiskResult};

// ============================================================================
// Rolling state and decision types
// ============================================================================

/// Rolling per-day risk state.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskStatus {
    /// Realized PnL accumulated today, in quote currency.
    pub daily_realized_pnl: Decimal,
    /// Daily PnL as percent of balance, from the last `can_trade` call.
    pub daily_pnl_percent: Decimal,
    /// Current consecutive-loss count.
    pub consecutive_losses: u32,
    /// Timestamp of the most recent losing trade.
    pub last_loss_at: Option<DateTime<Utc>>,
    /// UTC day this status applies to.
    pub current_day: NaiveDate,
}

impl RiskStatus {
    fn fresh(day: NaiveDate) -> Self {
        Self {
            daily_realized_pnl: Decimal::ZERO,
            daily_pnl_percent: Decimal::ZERO,
            consecutive_losses: 0,
            last_loss_at: None,
            current_day: day,
        }
    }
}

/// Figures backing a risk decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskDetails {
    /// Daily PnL percent at decision time.
    pub daily_pnl_percent: Decimal,
    /// Consecutive losses at decision time.
    pub consecutive_losses: u32,
    /// Open position count at decision time.
    pub open_positions: u32,
    /// Prospective total exposure percent (existing margin + new size).
    pub total_exposure_percent: Decimal,
    /// Streak multiplier applied to the position size.
    pub size_multiplier: Decimal,
}

/// Outcome of a `can_trade` check. Always fully populated.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskDecision {
    /// Whether the entry is allowed.
    pub allowed: bool,
    /// Single-sentence reason naming the breached limit, when blocked.
    pub reason: Option<String>,
    /// Position size to use, when allowed.
    pub adjusted_position_size: Option<Decimal>,
    /// Figures the decision was based on.
    pub details: RiskDetails,
}

/// A closed trade reported back to the risk manager.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeResult {
    /// Trading symbol.
    pub symbol: String,
    /// Realized PnL in quote currency (negative = loss).
    pub realized_pnl: Decimal,
    /// Entry price of the trade.
    pub entry_price: Decimal,
    /// Close timestamp.
    pub closed_at: DateTime<Utc>,
}

// ============================================================================
// RiskManager
// ============================================================================

/// Session risk gatekeeper. One instance per trading session; single writer.
pub struct RiskManager {
    config: RiskManagerConfig,
    status: RiskStatus,
}

impl RiskManager {
    /// Create a manager with fresh daily state.
    #[must_use]
    pub fn new(config: RiskManagerConfig) -> Self {
        Self {
            config,
            status: RiskStatus::fresh(Utc::now().date_naive()),
        }
    }

    /// Current rolling state.
    #[must_use]
    pub fn status(&self) -> &RiskStatus {
        &self.status
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &RiskManagerConfig {
        &self.config
    }

    /// Roll the daily state to `day`, resetting counters if it changed.
    ///
    /// Exposed for deterministic tests; production callers never need it
    /// because `can_trade` and `record_trade_result` roll automatically.
    pub fn roll_day_to(&mut self, day: NaiveDate) {
        if day != self.status.current_day {
            info!(
                previous_day = %self.status.current_day,
                day = %day,
                daily_pnl = %self.status.daily_realized_pnl,
                "Daily risk state reset"
            );
            self.status = RiskStatus::fresh(day);
        }
    }

    /// Gate an entry: validate the signal, enforce all limits and compute
    /// the position size as one atomic check.
    ///
    /// Async only to keep the call signature uniform with the surrounding
    /// orchestration; performs no I/O.
    ///
    /// # Errors
    ///
    /// `RiskError::Validation` when the signal itself is malformed
    /// (price ≤ 0 or confidence outside [0, 100]) — a caller bug, not a
    /// business rejection.
    pub async fn can_trade(
        &mut self,
        signal: &Signal,
        account_balance: Decimal,
        open_positions: &[Position],
    ) -> RiskResult<RiskDecision> {
        // Contract validation: raise, never return a decision.
        if !signal.price.is_positive() {
            return Err(RiskError::Validation {
                reason: format!("signal price must be positive, got {}", signal.price),
            });
        }
        if signal.confidence < Decimal::ZERO || signal.confidence > Decimal::from(100) {
            return Err(RiskError::Validation {
                reason: format!(
                    "signal confidence must be within [0, 100], got {}",
                    signal.confidence
                ),
            });
        }

        self.roll_day_to(Utc::now().date_naive());

        let multiplier = self.size_multiplier();
        let open_count = open_positions.len() as u32;

        // Zero or negative balance is an expected operational condition:
        // degrade to a blocked decision instead of raising.
        if account_balance <= Decimal::ZERO {
            warn!(balance = %account_balance, "Risk check with invalid balance");
            return Ok(self.blocked(
                format!("Invalid account balance: {account_balance}"),
                open_count,
                Decimal::ZERO,
                multiplier,
            ));
        }

        let daily_pnl_percent =
            self.status.daily_realized_pnl / account_balance * Decimal::from(100);
        self.status.daily_pnl_percent = daily_pnl_percent;

        // Daily loss limit.
        if daily_pnl_percent <= -self.config.max_daily_loss_percent {
            return Ok(self.blocked(
                format!(
                    "Daily loss limit reached: {daily_pnl_percent:.2}% <= -{:.2}%",
                    self.config.max_daily_loss_percent
                ),
                open_count,
                Decimal::ZERO,
                multiplier,
            ));
        }

        // Daily profit limit.
        if daily_pnl_percent >= self.config.max_daily_profit_percent {
            return Ok(self.blocked(
                format!(
                    "Daily profit limit reached: {daily_pnl_percent:.2}% >= {:.2}%",
                    self.config.max_daily_profit_percent
                ),
                open_count,
                Decimal::ZERO,
                multiplier,
            ));
        }

        // Consecutive-loss limit.
        if self.status.consecutive_losses >= self.config.loss_streak.stop_after_losses {
            return Ok(self.blocked(
                format!(
                    "Consecutive loss limit exceeded: {} losses",
                    self.status.consecutive_losses
                ),
                open_count,
                Decimal::ZERO,
                multiplier,
            ));
        }

        // Position size before exposure math so the prospective total can
        // include the new entry.
        let size = self.position_size(account_balance, multiplier);
        let existing_exposure_percent = open_positions
            .iter()
            .map(|p| p.margin_usdt)
            .sum::<Decimal>()
            / account_balance
            * Decimal::from(100);
        let new_exposure_percent = size / account_balance * Decimal::from(100);
        let total_exposure_percent = existing_exposure_percent + new_exposure_percent;

        // Concurrency limits, skipped entirely when disabled.
        if self.config.concurrent.enabled {
            if open_count >= self.config.concurrent.max_positions {
                return Ok(self.blocked(
                    format!(
                        "Maximum concurrent positions reached: {open_count} >= {}",
                        self.config.concurrent.max_positions
                    ),
                    open_count,
                    total_exposure_percent,
                    multiplier,
                ));
            }
            if total_exposure_percent > self.config.concurrent.max_total_exposure_percent {
                return Ok(self.blocked(
                    format!(
                        "Total exposure limit exceeded: {total_exposure_percent:.2}% > {:.2}%",
                        self.config.concurrent.max_total_exposure_percent
                    ),
                    open_count,
                    total_exposure_percent,
                    multiplier,
                ));
            }
        }

        debug!(
            size = %size,
            multiplier = %multiplier,
            exposure_pct = %total_exposure_percent,
            "Risk check passed"
        );

        Ok(RiskDecision {
            allowed: true,
            reason: None,
            adjusted_position_size: Some(size),
            details: RiskDetails {
                daily_pnl_percent,
                consecutive_losses: self.status.consecutive_losses,
                open_positions: open_count,
                total_exposure_percent,
                size_multiplier: multiplier,
            },
        })
    }

    /// Feed a closed trade back into the rolling state.
    ///
    /// Never fails. Malformed trades (non-positive entry price) are logged
    /// and skipped so a corrupt record cannot poison the running totals.
    pub fn record_trade_result(&mut self, trade: &TradeResult) {
        if trade.entry_price <= Decimal::ZERO {
            warn!(
                symbol = %trade.symbol,
                entry_price = %trade.entry_price,
                "Skipping malformed trade result"
            );
            return;
        }

        self.roll_day_to(Utc::now().date_naive());
        self.status.daily_realized_pnl += trade.realized_pnl;

        if trade.realized_pnl < Decimal::ZERO {
            self.status.consecutive_losses += 1;
            self.status.last_loss_at = Some(trade.closed_at);
            debug!(
                symbol = %trade.symbol,
                pnl = %trade.realized_pnl,
                streak = self.status.consecutive_losses,
                "Loss recorded"
            );
        } else if trade.realized_pnl > Decimal::ZERO {
            self.status.consecutive_losses = 0;
        }
        // Exactly zero: break-even, streak unchanged.
    }

    /// Streak multiplier from the explicit config schedule.
    fn size_multiplier(&self) -> Decimal {
        let streak = self.status.consecutive_losses;
        let schedule = &self.config.loss_streak;
        match streak {
            0 | 1 => Decimal::ONE,
            2 => schedule.multiplier_after_two,
            3 => schedule.multiplier_after_three,
            _ => schedule.multiplier_after_four,
        }
    }

    /// Position size: risk fraction of balance, tapered by the streak
    /// multiplier, clamped to the configured bounds.
    fn position_size(&self, account_balance: Decimal, multiplier: Decimal) -> Decimal {
        let sizing = &self.config.sizing;
        let raw = account_balance * sizing.risk_per_trade_percent / Decimal::from(100) * multiplier;
        raw.clamp(sizing.min_position_size_usdt, sizing.max_position_size_usdt)
    }

    fn blocked(
        &self,
        reason: String,
        open_positions: u32,
        total_exposure_percent: Decimal,
        multiplier: Decimal,
    ) -> RiskDecision {
        debug!(reason = %reason, "Risk check blocked");
        RiskDecision {
            allowed: false,
            reason: Some(reason),
            adjusted_position_size: None,
            details: RiskDetails {
                daily_pnl_percent: self.status.daily_pnl_percent,
                consecutive_losses: self.status.consecutive_losses,
                open_positions,
                total_exposure_percent,
                size_multiplier: multiplier,
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConcurrentRiskConfig, PositionSizingConfig};
    use ladder_core::{Price, Qty, Side, SignalDirection, SignalKind, StopLoss};
    use rust_decimal_macros::dec;

    fn signal(confidence: Decimal, price: Decimal) -> Signal {
        Signal::new(
            SignalDirection::Long,
            SignalKind::Breakout,
            confidence,
            Price::new(price),
            Price::new(dec!(99)),
            vec![Price::new(dec!(101))],
            "test",
        )
    }

    fn position_with_margin(margin: Decimal) -> Position {
        Position::new(
            "BTCUSDT",
            Side::Long,
            Price::new(dec!(100)),
            Qty::new(dec!(1)),
            5,
            margin,
            StopLoss::new(Price::new(dec!(99))),
            Vec::new(),
            "test",
        )
    }

    fn loss(pnl: Decimal) -> TradeResult {
        TradeResult {
            symbol: "BTCUSDT".into(),
            realized_pnl: pnl,
            entry_price: dec!(100),
            closed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_invalid_signal_raises() {
        let mut manager = RiskManager::new(RiskManagerConfig::default());

        let bad_price = signal(dec!(80), dec!(0));
        let err = manager.can_trade(&bad_price, dec!(1000), &[]).await;
        assert!(matches!(err, Err(RiskError::Validation { .. })));

        let bad_confidence = signal(dec!(120), dec!(100));
        let err = manager.can_trade(&bad_confidence, dec!(1000), &[]).await;
        assert!(matches!(err, Err(RiskError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_invalid_balance_degrades_to_blocked() {
        let mut manager = RiskManager::new(RiskManagerConfig::default());
        let decision = manager
            .can_trade(&signal(dec!(80), dec!(100)), dec!(0), &[])
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("Invalid account balance"));
    }

    /// Suite scenario: balance 1000, one trade at -100 (-10% vs 5% limit)
    /// → subsequent can_trade blocks on the daily loss limit.
    #[tokio::test]
    async fn test_daily_loss_limit_blocks() {
        let mut manager = RiskManager::new(RiskManagerConfig::default());
        manager.record_trade_result(&loss(dec!(-100)));

        let decision = manager
            .can_trade(&signal(dec!(80), dec!(100)), dec!(1000), &[])
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("Daily loss limit"));
        assert_eq!(decision.details.daily_pnl_percent, dec!(-10));
    }

    #[tokio::test]
    async fn test_daily_profit_limit_blocks() {
        let mut manager = RiskManager::new(RiskManagerConfig::default());
        manager.record_trade_result(&TradeResult {
            realized_pnl: dec!(150),
            ..loss(dec!(0))
        });

        let decision = manager
            .can_trade(&signal(dec!(80), dec!(100)), dec!(1000), &[])
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("Daily profit limit"));
    }

    #[tokio::test]
    async fn test_consecutive_loss_limit_blocks() {
        let mut manager = RiskManager::new(RiskManagerConfig::default());
        // Four small losses trip the streak limit without touching the
        // daily loss percentage limit.
        for _ in 0..4 {
            manager.record_trade_result(&loss(dec!(-1)));
        }

        let decision = manager
            .can_trade(&signal(dec!(80), dec!(100)), dec!(1000), &[])
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert!(decision
            .reason
            .unwrap()
            .contains("Consecutive loss limit exceeded"));
    }

    #[tokio::test]
    async fn test_win_resets_streak() {
        let mut manager = RiskManager::new(RiskManagerConfig::default());
        for _ in 0..3 {
            manager.record_trade_result(&loss(dec!(-1)));
        }
        assert_eq!(manager.status().consecutive_losses, 3);

        manager.record_trade_result(&TradeResult {
            realized_pnl: dec!(5),
            ..loss(dec!(0))
        });
        assert_eq!(manager.status().consecutive_losses, 0);
    }

    #[tokio::test]
    async fn test_breakeven_trade_leaves_streak() {
        let mut manager = RiskManager::new(RiskManagerConfig::default());
        manager.record_trade_result(&loss(dec!(-1)));
        manager.record_trade_result(&loss(dec!(0)));
        assert_eq!(manager.status().consecutive_losses, 1);
    }

    #[tokio::test]
    async fn test_malformed_trade_skipped() {
        let mut manager = RiskManager::new(RiskManagerConfig::default());
        manager.record_trade_result(&TradeResult {
            entry_price: dec!(0),
            realized_pnl: dec!(-500),
            ..loss(dec!(0))
        });
        // Corrupt record contributed nothing.
        assert_eq!(manager.status().daily_realized_pnl, Decimal::ZERO);
        assert_eq!(manager.status().consecutive_losses, 0);
    }

    #[tokio::test]
    async fn test_position_sizing_default() {
        let mut manager = RiskManager::new(RiskManagerConfig::default());
        let decision = manager
            .can_trade(&signal(dec!(80), dec!(100)), dec!(1000), &[])
            .await
            .unwrap();
        assert!(decision.allowed);
        // 1000 * 2% = 20
        assert_eq!(decision.adjusted_position_size, Some(dec!(20)));
        assert_eq!(decision.details.size_multiplier, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_streak_multiplier_tapers_size() {
        let mut manager = RiskManager::new(RiskManagerConfig::default());
        manager.record_trade_result(&loss(dec!(-1)));
        manager.record_trade_result(&loss(dec!(-1)));

        let decision = manager
            .can_trade(&signal(dec!(80), dec!(100)), dec!(1000), &[])
            .await
            .unwrap();
        assert!(decision.allowed);
        // 1000 * 2% * 0.75 = 15
        assert_eq!(decision.adjusted_position_size, Some(dec!(15)));
        assert_eq!(decision.details.size_multiplier, dec!(0.75));
    }

    #[tokio::test]
    async fn test_size_clamped_to_bounds() {
        let config = RiskManagerConfig {
            sizing: PositionSizingConfig {
                min_position_size_usdt: dec!(50),
                max_position_size_usdt: dec!(100),
                risk_per_trade_percent: dec!(2),
                max_leverage: 10,
            },
            ..Default::default()
        };
        let mut manager = RiskManager::new(config);

        // 1000 * 2% = 20, clamped up to the 50 floor.
        let decision = manager
            .can_trade(&signal(dec!(80), dec!(100)), dec!(1000), &[])
            .await
            .unwrap();
        assert_eq!(decision.adjusted_position_size, Some(dec!(50)));

        // 100000 * 2% = 2000, clamped down to the 100 ceiling.
        let decision = manager
            .can_trade(&signal(dec!(80), dec!(100)), dec!(100_000), &[])
            .await
            .unwrap();
        assert_eq!(decision.adjusted_position_size, Some(dec!(100)));
    }

    #[tokio::test]
    async fn test_max_positions_blocks() {
        let mut manager = RiskManager::new(RiskManagerConfig::default());
        let open: Vec<Position> = (0..3).map(|_| position_with_margin(dec!(10))).collect();

        let decision = manager
            .can_trade(&signal(dec!(80), dec!(100)), dec!(1000), &open)
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert!(decision
            .reason
            .unwrap()
            .contains("Maximum concurrent positions"));
    }

    #[tokio::test]
    async fn test_exposure_limit_blocks() {
        let mut manager = RiskManager::new(RiskManagerConfig::default());
        // Two positions with 290 margin total: 29% + 2% new = 31% > 30%.
        let open = vec![
            position_with_margin(dec!(145)),
            position_with_margin(dec!(145)),
        ];

        let decision = manager
            .can_trade(&signal(dec!(80), dec!(100)), dec!(1000), &open)
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("Total exposure limit"));
    }

    #[tokio::test]
    async fn test_concurrency_checks_disabled() {
        let config = RiskManagerConfig {
            concurrent: ConcurrentRiskConfig {
                enabled: false,
                max_positions: 1,
                max_total_exposure_percent: dec!(1),
            },
            ..Default::default()
        };
        let mut manager = RiskManager::new(config);
        let open: Vec<Position> = (0..5).map(|_| position_with_margin(dec!(500))).collect();

        let decision = manager
            .can_trade(&signal(dec!(80), dec!(100)), dec!(1000), &open)
            .await
            .unwrap();
        assert!(decision.allowed, "disabled concurrency must not block");
    }

    #[tokio::test]
    async fn test_day_roll_resets_state() {
        let mut manager = RiskManager::new(RiskManagerConfig::default());
        for _ in 0..4 {
            manager.record_trade_result(&loss(dec!(-10)));
        }
        assert_eq!(manager.status().consecutive_losses, 4);

        let next_day = manager.status().current_day + chrono::Days::new(1);
        manager.roll_day_to(next_day);
        assert_eq!(manager.status().consecutive_losses, 0);
        assert_eq!(manager.status().daily_realized_pnl, Decimal::ZERO);
        assert_eq!(manager.status().current_day, next_day);
    }
}
