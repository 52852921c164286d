//! Core domain types for the ladder trading bot.
//!
//! This crate provides fundamental types used throughout the trading system:
//! - `Price`, `Qty`: Precision-safe numeric types
//! - `Position`, `StopLoss`, `TakeProfit`: Live trade state
//! - `PositionState`: Exit lifecycle states (OPEN → TP1_HIT → ... → CLOSED)
//! - `Signal`, `TrendBias`: Entry candidate types

pub mod decimal;
pub mod error;
pub mod market;
pub mod position;
pub mod signal;

pub use decimal::{Price, Qty};
pub use error::{CoreError, Result};
pub use market::{Candle, ExitIndicators};
pub use position::{
    ladder_is_ordered, Position, PositionState, PositionStatus, Side, StopLoss, TakeProfit,
};
pub use signal::{FlatMarketAnalysis, Signal, SignalDirection, SignalKind, TrendBias, TrendDirection};
