//! Pure decision functions for the trading pipeline.
//!
//! Both `evaluate_entry` and `evaluate_exit` are deterministic, side-effect
//! free and total: any input, however malformed, produces a structured
//! decision. Invalid exit inputs fail safe — the decision is to close the
//! position rather than hang in an ambiguous state.
//!
//! State is tracked by the caller: `evaluate_exit` receives the current
//! lifecycle state and returns the next one; it never persists anything.

pub mod entry;
pub mod exit;

pub use entry::{
    evaluate_entry, ConflictAnalysis, EntryContext, EntryDecision, EntryVerdict,
    DEFAULT_FLAT_CONFIDENCE_THRESHOLD,
};
pub use exit::{
    evaluate_exit, ClosureReason, ExitAction, ExitConfig, ExitContext, ExitDecision, ExitMetadata,
};
