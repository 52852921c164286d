//! Error registry and structured logging.
//!
//! The `ErrorRegistry` accumulates cross-cutting error statistics
//! (occurrence counts, recovery rates, average recovery time) per
//! `code:DOMAIN` key. It is an explicit, injected instance — never a
//! process-global — so multiple trading sessions can run isolated within
//! one process.

pub mod error;
pub mod logging;
pub mod registry;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use registry::{ErrorRegistry, ErrorStats, RegistrySummary, DEFAULT_HEALTH_THRESHOLD};
