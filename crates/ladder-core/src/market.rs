//! Market data boundary types.

use crate::Price;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV candle as returned by the exchange collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Candle open time.
    pub open_time: DateTime<Utc>,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Decimal,
}

impl Candle {
    /// Check if this is a bullish (close above open) candle.
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Indicator snapshot consumed by the exit decision.
///
/// All fields are optional: the exit state machine must produce a correct
/// decision when indicators are missing or partial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitIndicators {
    /// ATR as a percentage of price.
    pub atr_percent: Option<Decimal>,
    /// Volume of the latest candle.
    pub current_volume: Option<Decimal>,
    /// Average volume over the lookback window.
    pub avg_volume: Option<Decimal>,
    /// EMA-20 value.
    pub ema20: Option<Price>,
}

impl ExitIndicators {
    /// Volume ratio (current / average), when both sides are usable.
    #[must_use]
    pub fn volume_ratio(&self) -> Option<Decimal> {
        match (self.current_volume, self.avg_volume) {
            (Some(cur), Some(avg)) if !avg.is_zero() && avg.is_sign_positive() => Some(cur / avg),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_volume_ratio() {
        let ind = ExitIndicators {
            current_volume: Some(dec!(150)),
            avg_volume: Some(dec!(100)),
            ..Default::default()
        };
        assert_eq!(ind.volume_ratio(), Some(dec!(1.5)));
    }

    #[test]
    fn test_volume_ratio_missing_or_zero_avg() {
        let ind = ExitIndicators::default();
        assert_eq!(ind.volume_ratio(), None);

        let ind = ExitIndicators {
            current_volume: Some(dec!(150)),
            avg_volume: Some(Decimal::ZERO),
            ..Default::default()
        };
        assert_eq!(ind.volume_ratio(), None);
    }
}
