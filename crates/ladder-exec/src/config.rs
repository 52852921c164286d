//! Session configuration.
//!
//! Aggregates the tunables of the decision core, risk manager and retry
//! policy into one TOML-loadable document.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

use ladder_decision::ExitConfig;
use ladder_error::RetryPolicy;
use ladder_risk::RiskManagerConfig;

use crate::error::{ExecError, ExecResult};

/// Entry pipeline thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryGateConfig {
    /// Minimum signal confidence, 0–100.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: Decimal,
    /// Conflict level (0–1) at or above which entries wait.
    #[serde(default = "default_conflict_threshold")]
    pub conflict_threshold: Decimal,
    /// Flat-market confidence at or above which entries are skipped.
    #[serde(default = "default_flat_confidence_threshold")]
    pub flat_confidence_threshold: Decimal,
}

fn default_min_confidence() -> Decimal {
    dec!(60)
}

fn default_conflict_threshold() -> Decimal {
    dec!(0.4)
}

fn default_flat_confidence_threshold() -> Decimal {
    dec!(70)
}

impl Default for EntryGateConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            conflict_threshold: default_conflict_threshold(),
            flat_confidence_threshold: default_flat_confidence_threshold(),
        }
    }
}

/// Top-level session configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Entry pipeline thresholds.
    #[serde(default)]
    pub entry: EntryGateConfig,
    /// Exit state machine tunables.
    #[serde(default)]
    pub exit: ExitConfig,
    /// Risk manager limits and sizing.
    #[serde(default)]
    pub risk: RiskManagerConfig,
    /// Retry backoff for exchange calls.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl SessionConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> ExecResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ExecError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a TOML file.
    pub fn from_toml_path(path: impl AsRef<Path>) -> ExecResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ExecError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> ExecResult<()> {
        if self.entry.min_confidence < Decimal::ZERO || self.entry.min_confidence > dec!(100) {
            return Err(ExecError::Config(format!(
                "entry.min_confidence must be within [0, 100], got {}",
                self.entry.min_confidence
            )));
        }
        if self.entry.conflict_threshold < Decimal::ZERO
            || self.entry.conflict_threshold > Decimal::ONE
        {
            return Err(ExecError::Config(format!(
                "entry.conflict_threshold must be within [0, 1], got {}",
                self.entry.conflict_threshold
            )));
        }
        if self.risk.sizing.min_position_size_usdt > self.risk.sizing.max_position_size_usdt {
            return Err(ExecError::Config(
                "risk.sizing: min_position_size_usdt exceeds max_position_size_usdt".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ExecError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
