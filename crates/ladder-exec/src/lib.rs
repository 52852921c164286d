//! Order execution and position exit orchestration.
//!
//! Thin glue between the pure decision core and the exchange:
//! - `PositionExiter` executes `ExitDecision` actions under an atomic
//!   per-position lock, with recovery strategies per collaborator
//!   (exchange: RETRY, journal: FALLBACK, notifier: SKIP)
//! - `EntryExecutor` gates entries through the `RiskManager` and places
//!   the opening order
//! - collaborator traits (`ExchangeClient`, `TradeJournal`, `Notifier`)
//!   abstract the out-of-scope concrete clients for dependency injection

pub mod client;
pub mod config;
pub mod error;
pub mod exit_lock;
pub mod exiter;

pub use client::{
    BoxFuture, ExchangeClient, JournalRollback, Notifier, OpenPositionRequest, TradeCloseRecord,
    TradeJournal,
};
pub use config::{EntryGateConfig, SessionConfig};
pub use error::{ExecError, ExecResult};
pub use exit_lock::{ExitGuard, ExitLockMap};
pub use exiter::{EntryExecutor, EntryOutcome, ExitOutcome, PositionExiter};
