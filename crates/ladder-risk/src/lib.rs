//! Session risk gatekeeper.
//!
//! Every entry passes through `RiskManager::can_trade` before an order is
//! placed: daily loss/profit limits, consecutive-loss limits, concurrency
//! and exposure limits, and position sizing are checked as one atomic
//! decision. Trade outcomes are fed back via `record_trade_result` to keep
//! the rolling daily state current.

pub mod config;
pub mod error;
pub mod manager;

pub use config::{
    ConcurrentRiskConfig, LossStreakConfig, PositionSizingConfig, RiskManagerConfig,
};
pub use error::{RiskError, RiskResult};
pub use manager::{RiskDecision, RiskDetails, RiskManager, RiskStatus, TradeResult};
