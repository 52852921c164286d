//! Entry decision pipeline.
//!
//! `evaluate_entry` filters candidate signals by confidence, applies the
//! flat-market gate, resolves direction conflicts by majority vote, checks
//! trend alignment and selects the strongest surviving signal.
//!
//! # Pipeline order
//!
//! 1. Input validation (no signals / invalid balance → SKIP)
//! 2. Confidence filter (at-threshold included, out-of-range excluded)
//! 3. Flat-market gate (at-threshold skips)
//! 4. Direction-conflict vote (exact tie → WAIT, checked before threshold)
//! 5. Trend alignment (blocked direction → SKIP)
//! 6. Selection (highest confidence in the winning direction → ENTER)

use ladder_core::{FlatMarketAnalysis, Position, Signal, SignalDirection, TrendBias};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Flat-market confidence gate used when the context supplies an analysis
/// without an explicit threshold.
pub const DEFAULT_FLAT_CONFIDENCE_THRESHOLD: Decimal = dec!(70);

/// Input bundle for `evaluate_entry`.
#[derive(Debug, Clone)]
pub struct EntryContext<'a> {
    /// Candidate signals from upstream analyzers.
    pub signals: &'a [Signal],
    /// Current account balance in quote currency.
    pub account_balance: Decimal,
    /// Currently open positions.
    pub open_positions: &'a [Position],
    /// Global trend bias.
    pub trend_bias: &'a TrendBias,
    /// Minimum signal confidence, 0–100. At-threshold signals pass.
    pub min_confidence: Decimal,
    /// Conflict level (0–1) at or above which the decision is WAIT.
    pub conflict_threshold: Decimal,
    /// Optional flat-market detection result.
    pub flat_market: Option<&'a FlatMarketAnalysis>,
    /// Confidence at or above which a flat market skips entry.
    pub flat_confidence_threshold: Option<Decimal>,
}

/// Entry verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryVerdict {
    Enter,
    Wait,
    Skip,
}

impl std::fmt::Display for EntryVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enter => write!(f, "ENTER"),
            Self::Wait => write!(f, "WAIT"),
            Self::Skip => write!(f, "SKIP"),
        }
    }
}

/// Outcome of the direction-conflict vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictAnalysis {
    /// Winning (majority) direction.
    pub direction: SignalDirection,
    /// Minority votes over total directional votes, 0–1.
    pub conflict_level: Decimal,
    /// Majority votes over total directional votes, 0–1.
    pub consensus_strength: Decimal,
}

/// Result of one entry evaluation.
///
/// `signal` borrows from the input slice: the selected signal is the very
/// object that was passed in, not a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDecision<'a> {
    /// Verdict.
    pub verdict: EntryVerdict,
    /// Selected signal on ENTER.
    pub signal: Option<&'a Signal>,
    /// Human-readable reason.
    pub reason: String,
    /// Vote analysis, when a vote took place.
    pub conflict: Option<ConflictAnalysis>,
}

impl<'a> EntryDecision<'a> {
    fn skip(reason: impl Into<String>) -> Self {
        Self {
            verdict: EntryVerdict::Skip,
            signal: None,
            reason: reason.into(),
            conflict: None,
        }
    }

    fn wait(reason: impl Into<String>, conflict: Option<ConflictAnalysis>) -> Self {
        Self {
            verdict: EntryVerdict::Wait,
            signal: None,
            reason: reason.into(),
            conflict,
        }
    }
}

/// Evaluate the entry pipeline over a set of candidate signals.
///
/// Pure and total: never panics, never mutates the context, and returns the
/// same decision (including signal identity) for identical inputs.
#[must_use]
pub fn evaluate_entry<'a>(ctx: &EntryContext<'a>) -> EntryDecision<'a> {
    // 1. Validation.
    if ctx.signals.is_empty() {
        return EntryDecision::skip("No signals available");
    }
    if ctx.account_balance <= Decimal::ZERO {
        return EntryDecision::skip("Invalid account balance");
    }

    // 2. Confidence filter: in-range and at or above the threshold.
    let hundred = Decimal::from(100);
    let candidates: Vec<&'a Signal> = ctx
        .signals
        .iter()
        .filter(|s| {
            s.confidence >= Decimal::ZERO
                && s.confidence <= hundred
                && s.confidence >= ctx.min_confidence
        })
        .collect();
    if candidates.is_empty() {
        return EntryDecision::skip(format!(
            "No signal meets the {}% confidence threshold",
            ctx.min_confidence
        ));
    }

    // 3. Flat-market gate. Absent analysis bypasses the gate.
    if let Some(flat) = ctx.flat_market {
        let threshold = ctx
            .flat_confidence_threshold
            .unwrap_or(DEFAULT_FLAT_CONFIDENCE_THRESHOLD);
        if flat.is_flat && flat.confidence >= threshold {
            return EntryDecision::skip(format!(
                "Flat market detected ({}% confidence)",
                flat.confidence
            ));
        }
    }

    // 4. Direction vote over non-HOLD candidates.
    let long_votes = candidates
        .iter()
        .filter(|s| s.direction == SignalDirection::Long)
        .count();
    let short_votes = candidates
        .iter()
        .filter(|s| s.direction == SignalDirection::Short)
        .count();
    let total_votes = long_votes + short_votes;

    if total_votes == 0 {
        return EntryDecision::skip("Only HOLD signals present");
    }

    // Exact tie is checked before the conflict threshold.
    if long_votes == short_votes {
        let analysis = ConflictAnalysis {
            direction: SignalDirection::Hold,
            conflict_level: dec!(0.5),
            consensus_strength: dec!(0.5),
        };
        return EntryDecision::wait(
            format!("NO CONSENSUS: equal votes ({long_votes} LONG vs {short_votes} SHORT)"),
            Some(analysis),
        );
    }

    let (majority, majority_votes, minority_votes) = if long_votes > short_votes {
        (SignalDirection::Long, long_votes, short_votes)
    } else {
        (SignalDirection::Short, short_votes, long_votes)
    };

    let total = Decimal::from(total_votes as u64);
    let conflict_level = Decimal::from(minority_votes as u64) / total;
    let consensus_strength = Decimal::from(majority_votes as u64) / total;
    let analysis = ConflictAnalysis {
        direction: majority,
        conflict_level,
        consensus_strength,
    };

    if conflict_level >= ctx.conflict_threshold {
        return EntryDecision::wait(
            format!(
                "Signal conflict too high ({conflict_level:.2} >= {:.2})",
                ctx.conflict_threshold
            ),
            Some(analysis),
        );
    }

    // 5. Trend alignment.
    if ctx.trend_bias.blocks(majority) {
        return EntryDecision {
            verdict: EntryVerdict::Skip,
            signal: None,
            reason: format!("Trend misalignment: {majority} blocked"),
            conflict: Some(analysis),
        };
    }

    // 6. Select the strongest candidate in the winning direction. Ties keep
    // the earliest signal, so repeated calls pick the identical object.
    let selected = candidates
        .iter()
        .filter(|s| s.direction == majority)
        .fold(None::<&&'a Signal>, |best, s| match best {
            Some(b) if b.confidence >= s.confidence => Some(b),
            _ => Some(s),
        })
        .copied();

    match selected {
        Some(signal) => EntryDecision {
            verdict: EntryVerdict::Enter,
            signal: Some(signal),
            reason: format!(
                "{majority} entry: {}% confidence, consensus {consensus_strength:.2}",
                signal.confidence
            ),
            conflict: Some(analysis),
        },
        // Defensive: a majority direction always has at least one candidate.
        None => EntryDecision::wait("No candidate in winning direction", Some(analysis)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ladder_core::{Price, SignalKind, TrendDirection};
    use rust_decimal_macros::dec;

    fn signal(direction: SignalDirection, confidence: Decimal) -> Signal {
        Signal::new(
            direction,
            SignalKind::Breakout,
            confidence,
            Price::new(dec!(100)),
            Price::new(dec!(99)),
            vec![Price::new(dec!(101)), Price::new(dec!(102))],
            "test signal",
        )
    }

    fn base_ctx<'a>(signals: &'a [Signal], bias: &'a TrendBias) -> EntryContext<'a> {
        EntryContext {
            signals,
            account_balance: dec!(1000),
            open_positions: &[],
            trend_bias: bias,
            min_confidence: dec!(60),
            conflict_threshold: dec!(0.4),
            flat_market: None,
            flat_confidence_threshold: None,
        }
    }

    #[test]
    fn test_no_signals_skips() {
        let bias = TrendBias::neutral();
        let decision = evaluate_entry(&base_ctx(&[], &bias));
        assert_eq!(decision.verdict, EntryVerdict::Skip);
        assert_eq!(decision.reason, "No signals available");
    }

    #[test]
    fn test_invalid_balance_skips() {
        let bias = TrendBias::neutral();
        let signals = vec![signal(SignalDirection::Long, dec!(80))];
        for balance in [dec!(0), dec!(-10)] {
            let mut ctx = base_ctx(&signals, &bias);
            ctx.account_balance = balance;
            let decision = evaluate_entry(&ctx);
            assert_eq!(decision.verdict, EntryVerdict::Skip);
            assert_eq!(decision.reason, "Invalid account balance");
        }
    }

    #[test]
    fn test_confidence_filter_bounds() {
        let bias = TrendBias::neutral();
        let signals = vec![
            signal(SignalDirection::Long, dec!(59.9)), // below threshold
            signal(SignalDirection::Long, dec!(101)),  // out of range
            signal(SignalDirection::Long, dec!(-5)),   // out of range
        ];
        let decision = evaluate_entry(&base_ctx(&signals, &bias));
        assert_eq!(decision.verdict, EntryVerdict::Skip);
        assert!(decision.reason.contains("confidence threshold"));
    }

    #[test]
    fn test_confidence_exactly_at_threshold_passes() {
        let bias = TrendBias::neutral();
        let signals = vec![signal(SignalDirection::Long, dec!(60))];
        let decision = evaluate_entry(&base_ctx(&signals, &bias));
        assert_eq!(decision.verdict, EntryVerdict::Enter);
    }

    #[test]
    fn test_flat_market_skips_at_threshold() {
        let bias = TrendBias::neutral();
        let signals = vec![signal(SignalDirection::Long, dec!(80))];
        let flat = FlatMarketAnalysis {
            is_flat: true,
            confidence: dec!(75),
        };
        let mut ctx = base_ctx(&signals, &bias);
        ctx.flat_market = Some(&flat);
        ctx.flat_confidence_threshold = Some(dec!(75)); // exactly at threshold skips
        let decision = evaluate_entry(&ctx);
        assert_eq!(decision.verdict, EntryVerdict::Skip);
        assert!(decision.reason.contains("Flat market"));
    }

    #[test]
    fn test_flat_market_below_threshold_passes() {
        let bias = TrendBias::neutral();
        let signals = vec![signal(SignalDirection::Long, dec!(80))];
        let flat = FlatMarketAnalysis {
            is_flat: true,
            confidence: dec!(50),
        };
        let mut ctx = base_ctx(&signals, &bias);
        ctx.flat_market = Some(&flat);
        ctx.flat_confidence_threshold = Some(dec!(75));
        let decision = evaluate_entry(&ctx);
        assert_eq!(decision.verdict, EntryVerdict::Enter);
    }

    #[test]
    fn test_flat_market_absent_bypasses_gate() {
        let bias = TrendBias::neutral();
        let signals = vec![signal(SignalDirection::Long, dec!(80))];
        let decision = evaluate_entry(&base_ctx(&signals, &bias));
        assert_eq!(decision.verdict, EntryVerdict::Enter);
    }

    /// Suite scenario: 3 LONG (80/75/70) + 1 SHORT (65), threshold 0.4.
    /// conflict = 1/4 = 0.25 < 0.4 → ENTER with the 80-confidence signal.
    #[test]
    fn test_majority_enter_selects_highest_confidence() {
        let bias = TrendBias::neutral();
        let signals = vec![
            signal(SignalDirection::Long, dec!(80)),
            signal(SignalDirection::Long, dec!(75)),
            signal(SignalDirection::Long, dec!(70)),
            signal(SignalDirection::Short, dec!(65)),
        ];
        let decision = evaluate_entry(&base_ctx(&signals, &bias));

        assert_eq!(decision.verdict, EntryVerdict::Enter);
        let selected = decision.signal.expect("signal selected");
        assert_eq!(selected.confidence, dec!(80));
        // Identity: the selected signal is the input object itself.
        assert!(std::ptr::eq(selected, &signals[0]));

        let analysis = decision.conflict.unwrap();
        assert_eq!(analysis.direction, SignalDirection::Long);
        assert_eq!(analysis.conflict_level, dec!(0.25));
        assert_eq!(analysis.consensus_strength, dec!(0.75));
    }

    /// Suite scenario: 2 LONG + 2 SHORT, threshold 0.51 → WAIT on the
    /// equal-votes path, not the threshold path.
    #[test]
    fn test_equal_votes_wait_takes_priority() {
        let bias = TrendBias::neutral();
        let signals = vec![
            signal(SignalDirection::Long, dec!(80)),
            signal(SignalDirection::Long, dec!(70)),
            signal(SignalDirection::Short, dec!(75)),
            signal(SignalDirection::Short, dec!(65)),
        ];
        let mut ctx = base_ctx(&signals, &bias);
        ctx.conflict_threshold = dec!(0.51);
        let decision = evaluate_entry(&ctx);

        assert_eq!(decision.verdict, EntryVerdict::Wait);
        assert!(decision.reason.contains("NO CONSENSUS"));
        assert!(decision.reason.contains("equal votes"));
    }

    #[test]
    fn test_conflict_above_threshold_waits() {
        let bias = TrendBias::neutral();
        // 2 LONG vs 1 SHORT: conflict = 1/3 ≈ 0.333
        let signals = vec![
            signal(SignalDirection::Long, dec!(80)),
            signal(SignalDirection::Long, dec!(70)),
            signal(SignalDirection::Short, dec!(75)),
        ];
        let mut ctx = base_ctx(&signals, &bias);
        ctx.conflict_threshold = dec!(0.3);
        let decision = evaluate_entry(&ctx);

        assert_eq!(decision.verdict, EntryVerdict::Wait);
        assert!(decision.reason.contains("Signal conflict too high"));
    }

    #[test]
    fn test_hold_signals_excluded_from_vote() {
        let bias = TrendBias::neutral();
        // HOLD votes must not count toward the tie.
        let signals = vec![
            signal(SignalDirection::Long, dec!(80)),
            signal(SignalDirection::Hold, dec!(90)),
            signal(SignalDirection::Hold, dec!(85)),
        ];
        let decision = evaluate_entry(&base_ctx(&signals, &bias));
        assert_eq!(decision.verdict, EntryVerdict::Enter);
        assert_eq!(decision.signal.unwrap().confidence, dec!(80));
    }

    #[test]
    fn test_only_hold_signals_skips() {
        let bias = TrendBias::neutral();
        let signals = vec![
            signal(SignalDirection::Hold, dec!(90)),
            signal(SignalDirection::Hold, dec!(85)),
        ];
        let decision = evaluate_entry(&base_ctx(&signals, &bias));
        assert_eq!(decision.verdict, EntryVerdict::Skip);
        assert_eq!(decision.reason, "Only HOLD signals present");
    }

    #[test]
    fn test_trend_misalignment_skips() {
        let bias = TrendBias {
            direction: TrendDirection::Bullish,
            strength: dec!(80),
            restricted: Vec::new(),
        };
        let signals = vec![
            signal(SignalDirection::Short, dec!(80)),
            signal(SignalDirection::Short, dec!(75)),
        ];
        let decision = evaluate_entry(&base_ctx(&signals, &bias));
        assert_eq!(decision.verdict, EntryVerdict::Skip);
        assert_eq!(decision.reason, "Trend misalignment: SHORT blocked");
    }

    #[test]
    fn test_determinism_and_identity() {
        let bias = TrendBias::neutral();
        let signals = vec![
            signal(SignalDirection::Long, dec!(80)),
            signal(SignalDirection::Long, dec!(80)), // tie: first wins
        ];
        let ctx = base_ctx(&signals, &bias);
        let first = evaluate_entry(&ctx);
        let second = evaluate_entry(&ctx);
        assert_eq!(first, second);
        assert!(std::ptr::eq(first.signal.unwrap(), &signals[0]));
    }
}
