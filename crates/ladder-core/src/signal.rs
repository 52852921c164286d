//! Entry signal types.
//!
//! Signals are produced by upstream analyzers (out of scope here) and
//! consumed read-only by the entry decision pipeline.

use crate::Price;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction a signal votes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalDirection {
    Long,
    Short,
    /// No directional opinion; excluded from consensus voting.
    Hold,
}

impl SignalDirection {
    /// Check if this is a directional (non-HOLD) vote.
    #[must_use]
    pub fn is_directional(&self) -> bool {
        !matches!(self, Self::Hold)
    }
}

impl std::fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// Signal classification. Informational only; decision logic keys off
/// direction and confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Breakout,
    Reversal,
    TrendFollow,
    Scalp,
}

/// A candidate entry produced by an analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Voted direction.
    pub direction: SignalDirection,
    /// Signal classification.
    pub kind: SignalKind,
    /// Confidence score, 0–100.
    pub confidence: Decimal,
    /// Suggested entry price.
    pub price: Price,
    /// Suggested stop-loss price.
    pub stop_loss: Price,
    /// Ordered take-profit prices.
    pub take_profits: Vec<Price>,
    /// Human-readable reason.
    pub reason: String,
    /// Generation timestamp.
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    #[must_use]
    pub fn new(
        direction: SignalDirection,
        kind: SignalKind,
        confidence: Decimal,
        price: Price,
        stop_loss: Price,
        take_profits: Vec<Price>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            direction,
            kind,
            confidence,
            price,
            stop_loss,
            take_profits,
            reason: reason.into(),
            generated_at: Utc::now(),
        }
    }
}

/// Global trend classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Global trend bias applied to entry decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendBias {
    /// Trend direction.
    pub direction: TrendDirection,
    /// Trend strength, 0–100.
    pub strength: Decimal,
    /// Explicitly restricted entry directions.
    pub restricted: Vec<SignalDirection>,
}

impl TrendBias {
    /// A neutral bias that blocks nothing.
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            direction: TrendDirection::Neutral,
            strength: Decimal::ZERO,
            restricted: Vec::new(),
        }
    }

    /// Check whether entries in `dir` are blocked by this bias.
    ///
    /// Blocked iff explicitly restricted, or counter-trend:
    /// BULLISH blocks SHORT, BEARISH blocks LONG, NEUTRAL blocks neither.
    #[must_use]
    pub fn blocks(&self, dir: SignalDirection) -> bool {
        if self.restricted.contains(&dir) {
            return true;
        }
        matches!(
            (self.direction, dir),
            (TrendDirection::Bullish, SignalDirection::Short)
                | (TrendDirection::Bearish, SignalDirection::Long)
        )
    }
}

/// Flat-market (ranging) detection result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatMarketAnalysis {
    /// Whether the market is classified as flat/ranging.
    pub is_flat: bool,
    /// Confidence in the classification, 0–100.
    pub confidence: Decimal,
}
