//! Collaborator traits for the execution layer.
//!
//! Trait-based abstractions over the concrete exchange, journal and
//! notification clients. This allows for:
//! - Dependency injection for testing
//! - Separation of decision logic from transport
//! - Future flexibility in client implementation
//!
//! All methods return boxed futures so the traits stay dyn-compatible.

use std::pin::Pin;

use chrono::{DateTime, Utc};
use ladder_core::{Candle, Price, Side};
use ladder_error::BoxError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Request to open a position on the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPositionRequest {
    /// Trading symbol.
    pub symbol: String,
    /// Position side.
    pub side: Side,
    /// Limit/entry price.
    pub price: Price,
    /// Margin to allocate, in USDT.
    pub size_usdt: Decimal,
    /// Leverage multiplier.
    pub leverage: u32,
    /// Initial stop-loss price.
    pub stop_loss: Price,
    /// Take-profit ladder prices, ordered.
    pub take_profits: Vec<Price>,
}

/// Exchange collaborator.
///
/// All operations are asynchronous and may fail with exchange-domain
/// errors (timeout, rejection, rate-limit); the orchestration wraps them
/// with the error handler.
pub trait ExchangeClient: Send + Sync {
    /// Close `percentage` percent of the remaining position.
    fn close_position(
        &self,
        position_id: &str,
        percentage: Decimal,
    ) -> BoxFuture<'_, Result<(), BoxError>>;

    /// Move the stop-loss; `trailing` activates trailing mode.
    fn update_stop_loss(
        &self,
        position_id: &str,
        new_stop: Price,
        trailing: bool,
    ) -> BoxFuture<'_, Result<(), BoxError>>;

    /// Place an opening order. Returns the exchange order id.
    fn open_position(&self, request: &OpenPositionRequest)
        -> BoxFuture<'_, Result<String, BoxError>>;

    /// Cancel all conditional (stop/TP) orders for a symbol.
    fn cancel_all_conditional_orders(&self, symbol: &str) -> BoxFuture<'_, Result<(), BoxError>>;

    /// Fetch candle history.
    fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<Candle>, BoxError>>;
}

/// A journaled trade close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeCloseRecord {
    /// Position id.
    pub position_id: String,
    /// Trading symbol.
    pub symbol: String,
    /// Position side.
    pub side: Side,
    /// Realized PnL in quote currency.
    pub realized_pnl: Decimal,
    /// PnL in percent of entry.
    pub pnl_percent: Decimal,
    /// Closure reason code (e.g. "SL_HIT").
    pub closure_reason: String,
    /// Close timestamp.
    pub closed_at: DateTime<Utc>,
}

/// Handle returned by the journal; allows undoing a record if the close
/// itself is later rolled back.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalRollback {
    /// Journal entry id.
    pub entry_id: String,
}

/// Trading journal collaborator.
///
/// Journal unavailability must never block a position close; callers wrap
/// these calls with the FALLBACK strategy.
pub trait TradeJournal: Send + Sync {
    /// Record a trade close. Returns a rollback handle.
    fn record_trade_close(
        &self,
        record: &TradeCloseRecord,
    ) -> BoxFuture<'_, Result<JournalRollback, BoxError>>;
}

/// Alert notification collaborator (best-effort; callers wrap with SKIP).
pub trait Notifier: Send + Sync {
    /// Send a human-readable alert.
    fn send_alert(&self, message: &str) -> BoxFuture<'_, Result<(), BoxError>>;
}
