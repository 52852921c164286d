//! Risk manager configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Size reduction schedule applied during a losing streak.
///
/// The multipliers are explicit per streak length so operators can tune the
/// taper without code changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossStreakConfig {
    /// Block new entries after this many consecutive losses.
    #[serde(default = "default_stop_after_losses")]
    pub stop_after_losses: u32,
    /// Size multiplier after 2 consecutive losses.
    #[serde(default = "default_multiplier_after_two")]
    pub multiplier_after_two: Decimal,
    /// Size multiplier after 3 consecutive losses.
    #[serde(default = "default_multiplier_after_three")]
    pub multiplier_after_three: Decimal,
    /// Size multiplier after 4 or more consecutive losses.
    #[serde(default = "default_multiplier_after_four")]
    pub multiplier_after_four: Decimal,
}

fn default_stop_after_losses() -> u32 {
    4
}

fn default_multiplier_after_two() -> Decimal {
    dec!(0.75)
}

fn default_multiplier_after_three() -> Decimal {
    dec!(0.5)
}

fn default_multiplier_after_four() -> Decimal {
    dec!(0.25)
}

impl Default for LossStreakConfig {
    fn default() -> Self {
        Self {
            stop_after_losses: default_stop_after_losses(),
            multiplier_after_two: default_multiplier_after_two(),
            multiplier_after_three: default_multiplier_after_three(),
            multiplier_after_four: default_multiplier_after_four(),
        }
    }
}

/// Concurrent position and exposure limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcurrentRiskConfig {
    /// Whether concurrency limits are enforced at all.
    #[serde(default = "default_concurrent_enabled")]
    pub enabled: bool,
    /// Maximum simultaneously open positions.
    #[serde(default = "default_max_positions")]
    pub max_positions: u32,
    /// Maximum total exposure (existing margin + new size) as percent of
    /// account balance.
    #[serde(default = "default_max_total_exposure_percent")]
    pub max_total_exposure_percent: Decimal,
}

fn default_concurrent_enabled() -> bool {
    true
}

fn default_max_positions() -> u32 {
    3
}

fn default_max_total_exposure_percent() -> Decimal {
    dec!(30)
}

impl Default for ConcurrentRiskConfig {
    fn default() -> Self {
        Self {
            enabled: default_concurrent_enabled(),
            max_positions: default_max_positions(),
            max_total_exposure_percent: default_max_total_exposure_percent(),
        }
    }
}

/// Position sizing bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSizingConfig {
    /// Floor for the computed size, in USDT.
    #[serde(default = "default_min_position_size_usdt")]
    pub min_position_size_usdt: Decimal,
    /// Ceiling for the computed size, in USDT.
    #[serde(default = "default_max_position_size_usdt")]
    pub max_position_size_usdt: Decimal,
    /// Fraction of the balance risked per trade, in percent.
    #[serde(default = "default_risk_per_trade_percent")]
    pub risk_per_trade_percent: Decimal,
    /// Maximum leverage multiplier.
    #[serde(default = "default_max_leverage")]
    pub max_leverage: u32,
}

fn default_min_position_size_usdt() -> Decimal {
    dec!(10)
}

fn default_max_position_size_usdt() -> Decimal {
    dec!(1000)
}

fn default_risk_per_trade_percent() -> Decimal {
    dec!(2)
}

fn default_max_leverage() -> u32 {
    10
}

impl Default for PositionSizingConfig {
    fn default() -> Self {
        Self {
            min_position_size_usdt: default_min_position_size_usdt(),
            max_position_size_usdt: default_max_position_size_usdt(),
            risk_per_trade_percent: default_risk_per_trade_percent(),
            max_leverage: default_max_leverage(),
        }
    }
}

/// Top-level risk manager configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskManagerConfig {
    /// Daily loss limit as percent of balance. Trading stops at or beyond.
    #[serde(default = "default_max_daily_loss_percent")]
    pub max_daily_loss_percent: Decimal,
    /// Daily profit limit as percent of balance. Trading stops at or beyond.
    #[serde(default = "default_max_daily_profit_percent")]
    pub max_daily_profit_percent: Decimal,
    /// Loss streak handling.
    #[serde(default)]
    pub loss_streak: LossStreakConfig,
    /// Concurrency limits.
    #[serde(default)]
    pub concurrent: ConcurrentRiskConfig,
    /// Sizing bounds.
    #[serde(default)]
    pub sizing: PositionSizingConfig,
}

fn default_max_daily_loss_percent() -> Decimal {
    dec!(5)
}

fn default_max_daily_profit_percent() -> Decimal {
    dec!(10)
}

impl Default for RiskManagerConfig {
    fn default() -> Self {
        Self {
            max_daily_loss_percent: default_max_daily_loss_percent(),
            max_daily_profit_percent: default_max_daily_profit_percent(),
            loss_streak: LossStreakConfig::default(),
            concurrent: ConcurrentRiskConfig::default(),
            sizing: PositionSizingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RiskManagerConfig::default();
        assert_eq!(config.loss_streak.stop_after_losses, 4);
        assert_eq!(config.concurrent.max_positions, 3);
        assert_eq!(config.sizing.risk_per_trade_percent, dec!(2));
    }

    #[test]
    fn test_toml_roundtrip_with_partial_input() {
        let toml_str = r#"
            max_daily_loss_percent = "3"

            [concurrent]
            max_positions = 5
        "#;
        let config: RiskManagerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_daily_loss_percent, dec!(3));
        assert_eq!(config.concurrent.max_positions, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.sizing.min_position_size_usdt, dec!(10));
    }
}
