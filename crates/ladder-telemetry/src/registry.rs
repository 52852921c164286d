//! Bounded error statistics registry.
//!
//! Tracks per-code occurrence and recovery statistics. The map is bounded:
//! once the number of distinct codes exceeds the ceiling, the entry with the
//! oldest first-seen timestamp is evicted. Recovery times use an incremental
//! mean so long-running processes never accumulate an unbounded sum.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ladder_error::{ErrorDomain, Severity, TradingError};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

/// Default ceiling on distinct tracked error codes.
const DEFAULT_MAX_TRACKED: usize = 100;

/// Default recovery-rate threshold for health checks.
pub const DEFAULT_HEALTH_THRESHOLD: f64 = 0.8;

/// Aggregate statistics for one error code.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorStats {
    /// Stable error code.
    pub code: String,
    /// Error domain.
    #[serde(serialize_with = "serialize_domain")]
    pub domain: ErrorDomain,
    /// Error severity.
    #[serde(serialize_with = "serialize_severity")]
    pub severity: Severity,
    /// Total occurrences.
    pub count: u64,
    /// First occurrence timestamp.
    pub first_seen: DateTime<Utc>,
    /// Most recent occurrence timestamp.
    pub last_seen: DateTime<Utc>,
    /// Occurrences that were recovered.
    pub recovered_count: u64,
    /// Running average recovery time in milliseconds.
    pub avg_recovery_time_ms: f64,
}

fn serialize_domain<S: serde::Serializer>(d: &ErrorDomain, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&d.to_string())
}

fn serialize_severity<S: serde::Serializer>(v: &Severity, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&v.to_string())
}

impl ErrorStats {
    /// Fraction of occurrences that were recovered.
    #[must_use]
    pub fn recovery_rate(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.recovered_count as f64 / self.count as f64
    }
}

/// Registry-wide aggregate summary.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySummary {
    /// Total recorded occurrences across all codes.
    pub total_errors: u64,
    /// Number of distinct tracked codes.
    pub distinct_codes: usize,
    /// Occurrences per domain.
    pub by_domain: HashMap<String, u64>,
    /// Occurrences per severity.
    pub by_severity: HashMap<String, u64>,
    /// Top codes by occurrence count, at most ten.
    pub top_errors: Vec<(String, u64)>,
    /// Recovered fraction across all occurrences.
    pub overall_recovery_rate: f64,
    /// Average recovery time across all recovered occurrences.
    pub avg_recovery_time_ms: f64,
}

#[derive(Default)]
struct RegistryInner {
    stats: HashMap<String, ErrorStats>,
}

/// Process-scoped error statistics registry.
///
/// Interior-locked so `record` takes `&self`; share via `Arc`.
pub struct ErrorRegistry {
    inner: Mutex<RegistryInner>,
    max_tracked: usize,
}

impl Default for ErrorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorRegistry {
    /// Create a registry with the default code ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_TRACKED)
    }

    /// Create a registry tracking at most `max_tracked` distinct codes.
    #[must_use]
    pub fn with_capacity(max_tracked: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            max_tracked: max_tracked.max(1),
        }
    }

    /// Record an error occurrence and its recovery outcome.
    ///
    /// `recovery_time_ms` contributes to the running average only when
    /// `recovered` is true.
    pub fn record(&self, error: &TradingError, recovered: bool, recovery_time_ms: Option<u64>) {
        let key = error.registry_key();
        let now = Utc::now();
        let mut inner = self.inner.lock();

        if !inner.stats.contains_key(&key) && inner.stats.len() >= self.max_tracked {
            // Evict the oldest-first-seen entry to bound growth.
            if let Some(oldest) = inner
                .stats
                .values()
                .min_by_key(|s| s.first_seen)
                .map(|s| format!("{}:{}", s.code, s.domain))
            {
                debug!(evicted = %oldest, "Error registry at capacity, evicting oldest code");
                inner.stats.remove(&oldest);
            }
        }

        let entry = inner.stats.entry(key).or_insert_with(|| ErrorStats {
            code: error.code().to_string(),
            domain: error.domain(),
            severity: error.severity(),
            count: 0,
            first_seen: now,
            last_seen: now,
            recovered_count: 0,
            avg_recovery_time_ms: 0.0,
        });

        entry.count += 1;
        entry.last_seen = now;

        if recovered {
            entry.recovered_count += 1;
            if let Some(ms) = recovery_time_ms {
                // Incremental mean: avg' = (avg * (n-1) + value) / n
                let n = entry.recovered_count as f64;
                entry.avg_recovery_time_ms =
                    (entry.avg_recovery_time_ms * (n - 1.0) + ms as f64) / n;
            }
        }
    }

    /// Statistics for one code/domain pair, if tracked.
    #[must_use]
    pub fn stats_for(&self, error: &TradingError) -> Option<ErrorStats> {
        self.inner.lock().stats.get(&error.registry_key()).cloned()
    }

    /// Aggregate summary across all tracked codes.
    #[must_use]
    pub fn summary(&self) -> RegistrySummary {
        let inner = self.inner.lock();

        let mut total_errors = 0u64;
        let mut total_recovered = 0u64;
        let mut by_domain: HashMap<String, u64> = HashMap::new();
        let mut by_severity: HashMap<String, u64> = HashMap::new();
        let mut recovery_time_weighted = 0.0f64;

        for stats in inner.stats.values() {
            total_errors += stats.count;
            total_recovered += stats.recovered_count;
            *by_domain.entry(stats.domain.to_string()).or_default() += stats.count;
            *by_severity.entry(stats.severity.to_string()).or_default() += stats.count;
            recovery_time_weighted += stats.avg_recovery_time_ms * stats.recovered_count as f64;
        }

        let mut top: Vec<(String, u64)> = inner
            .stats
            .values()
            .map(|s| (s.code.clone(), s.count))
            .collect();
        top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top.truncate(10);

        RegistrySummary {
            total_errors,
            distinct_codes: inner.stats.len(),
            by_domain,
            by_severity,
            top_errors: top,
            overall_recovery_rate: if total_errors == 0 {
                0.0
            } else {
                total_recovered as f64 / total_errors as f64
            },
            avg_recovery_time_ms: if total_recovered == 0 {
                0.0
            } else {
                recovery_time_weighted / total_recovered as f64
            },
        }
    }

    /// Compare the overall recovery rate against a threshold.
    ///
    /// Vacuously healthy when nothing has been recorded.
    #[must_use]
    pub fn is_healthy(&self, threshold: f64) -> bool {
        let summary = self.summary();
        if summary.total_errors == 0 {
            return true;
        }
        summary.overall_recovery_rate >= threshold
    }

    /// Number of distinct tracked codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().stats.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all recorded statistics. Intended for test isolation.
    pub fn clear(&self) {
        self.inner.lock().stats.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error() -> TradingError {
        TradingError::ExchangeApi {
            reason: "HTTP 502".into(),
        }
    }

    fn timeout_error() -> TradingError {
        TradingError::OrderTimeout { duration_ms: 5000 }
    }

    #[test]
    fn test_record_and_recovery_rate() {
        let registry = ErrorRegistry::new();
        registry.record(&api_error(), true, Some(100));
        registry.record(&api_error(), false, None);
        registry.record(&api_error(), true, Some(300));

        let stats = registry.stats_for(&api_error()).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.recovered_count, 2);
        assert!((stats.recovery_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_incremental_mean_recovery_time() {
        let registry = ErrorRegistry::new();
        registry.record(&api_error(), true, Some(100));
        registry.record(&api_error(), true, Some(200));
        registry.record(&api_error(), true, Some(600));

        let stats = registry.stats_for(&api_error()).unwrap();
        assert!((stats.avg_recovery_time_ms - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_recovery_time_ignored_when_not_recovered() {
        let registry = ErrorRegistry::new();
        registry.record(&api_error(), false, Some(999));

        let stats = registry.stats_for(&api_error()).unwrap();
        assert_eq!(stats.recovered_count, 0);
        assert_eq!(stats.avg_recovery_time_ms, 0.0);
    }

    #[test]
    fn test_eviction_of_oldest_code() {
        let registry = ErrorRegistry::with_capacity(2);
        registry.record(&api_error(), true, None);
        registry.record(&timeout_error(), true, None);
        // Third distinct code evicts the oldest (api_error).
        registry.record(
            &TradingError::JournalWrite {
                reason: "disk".into(),
            },
            false,
            None,
        );

        assert_eq!(registry.len(), 2);
        assert!(registry.stats_for(&api_error()).is_none());
        assert!(registry.stats_for(&timeout_error()).is_some());
    }

    #[test]
    fn test_is_healthy_vacuous_when_empty() {
        let registry = ErrorRegistry::new();
        assert!(registry.is_healthy(DEFAULT_HEALTH_THRESHOLD));
        assert!(registry.is_healthy(1.0));
    }

    #[test]
    fn test_is_healthy_threshold() {
        let registry = ErrorRegistry::new();
        registry.record(&api_error(), true, None);
        registry.record(&api_error(), true, None);
        registry.record(&api_error(), false, None);
        registry.record(&api_error(), false, None);

        assert!(registry.is_healthy(0.5));
        assert!(!registry.is_healthy(0.8));
    }

    #[test]
    fn test_summary_breakdowns_and_top() {
        let registry = ErrorRegistry::new();
        for _ in 0..3 {
            registry.record(&api_error(), true, Some(100));
        }
        registry.record(&timeout_error(), false, None);

        let summary = registry.summary();
        assert_eq!(summary.total_errors, 4);
        assert_eq!(summary.distinct_codes, 2);
        assert_eq!(summary.by_domain.get("EXCHANGE"), Some(&3));
        assert_eq!(summary.by_domain.get("ORDER"), Some(&1));
        assert_eq!(summary.by_severity.get("HIGH"), Some(&4));
        assert_eq!(summary.top_errors[0], ("EXCHANGE_API_ERROR".into(), 3));
        assert!((summary.overall_recovery_rate - 0.75).abs() < 1e-9);
        assert!((summary.avg_recovery_time_ms - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_clear_for_test_isolation() {
        let registry = ErrorRegistry::new();
        registry.record(&api_error(), true, None);
        assert!(!registry.is_empty());
        registry.clear();
        assert!(registry.is_empty());
    }
}
