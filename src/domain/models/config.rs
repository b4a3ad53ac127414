//! Configuration models.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::trace::DEFAULT_DECAY_RATE;
use crate::domain::errors::{DomainError, DomainResult};

/// Main configuration structure for stigmergy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Round driver configuration
    #[serde(default)]
    pub collective: CollectiveConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Round driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CollectiveConfig {
    /// Per-type decay rate overrides (0.0-1.0)
    #[serde(default)]
    pub decay_rates: HashMap<String, f64>,

    /// Decay rate for trace types without an override (0.0-1.0)
    #[serde(default = "default_decay_rate")]
    pub default_decay_rate: f64,

    /// Number of recent state fingerprints remembered for cycle detection
    #[serde(default = "default_max_cycle_history")]
    pub max_cycle_history: usize,

    /// Consecutive rounds without an active agent before the run converges
    #[serde(default = "default_idle_rounds_threshold")]
    pub idle_rounds_threshold: u32,

    /// Round budget used when a run does not specify one
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Upper bound on a single agent action, in milliseconds
    #[serde(default = "default_agent_timeout_ms")]
    pub agent_timeout_ms: u64,
}

const fn default_decay_rate() -> f64 {
    DEFAULT_DECAY_RATE
}

const fn default_max_cycle_history() -> usize {
    10
}

const fn default_idle_rounds_threshold() -> u32 {
    2
}

const fn default_max_rounds() -> u32 {
    10
}

const fn default_agent_timeout_ms() -> u64 {
    300_000 // 5 minutes
}

impl Default for CollectiveConfig {
    fn default() -> Self {
        Self {
            decay_rates: HashMap::new(),
            default_decay_rate: default_decay_rate(),
            max_cycle_history: default_max_cycle_history(),
            idle_rounds_threshold: default_idle_rounds_threshold(),
            max_rounds: default_max_rounds(),
            agent_timeout_ms: default_agent_timeout_ms(),
        }
    }
}

impl CollectiveConfig {
    /// Set the decay rate for one trace type.
    pub fn with_decay_rate(mut self, trace_type: impl Into<String>, rate: f64) -> Self {
        self.decay_rates.insert(trace_type.into(), rate);
        self
    }

    /// Set the cycle detection window.
    pub const fn with_max_cycle_history(mut self, max_cycle_history: usize) -> Self {
        self.max_cycle_history = max_cycle_history;
        self
    }

    /// Set the per-agent action timeout.
    pub const fn with_agent_timeout_ms(mut self, agent_timeout_ms: u64) -> Self {
        self.agent_timeout_ms = agent_timeout_ms;
        self
    }

    /// Set the number of idle rounds that count as convergence.
    pub const fn with_idle_rounds_threshold(mut self, idle_rounds_threshold: u32) -> Self {
        self.idle_rounds_threshold = idle_rounds_threshold;
        self
    }

    /// Check the values a collective relies on.
    ///
    /// Decay rates must lie in `[0, 1]`; the cycle window, idle threshold,
    /// round budget and agent timeout must all be at least one.
    pub fn validate(&self) -> DomainResult<()> {
        let rates = std::iter::once(("default", self.default_decay_rate))
            .chain(self.decay_rates.iter().map(|(t, r)| (t.as_str(), *r)));
        for (trace_type, rate) in rates {
            if !(0.0..=1.0).contains(&rate) {
                return Err(DomainError::ValidationFailed(format!(
                    "decay rate for {trace_type:?} must be within [0, 1], got {rate}"
                )));
            }
        }
        if self.max_cycle_history == 0 {
            return Err(DomainError::ValidationFailed(
                "max_cycle_history must be at least 1".to_string(),
            ));
        }
        if self.idle_rounds_threshold == 0 {
            return Err(DomainError::ValidationFailed(
                "idle_rounds_threshold must be at least 1".to_string(),
            ));
        }
        if self.max_rounds == 0 {
            return Err(DomainError::ValidationFailed(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        if self.agent_timeout_ms == 0 {
            return Err(DomainError::ValidationFailed(
                "agent_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved decay rates for the environment.
    pub fn decay(&self) -> DecayRates {
        DecayRates {
            default_rate: self.default_decay_rate,
            per_type: self.decay_rates.clone(),
        }
    }
}

/// Decay rates keyed by trace type, with a fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayRates {
    /// Rate for types without an override
    pub default_rate: f64,

    /// Per-type overrides
    pub per_type: HashMap<String, f64>,
}

impl Default for DecayRates {
    fn default() -> Self {
        Self {
            default_rate: DEFAULT_DECAY_RATE,
            per_type: HashMap::new(),
        }
    }
}

impl DecayRates {
    /// Set the rate for one trace type.
    pub fn with(mut self, trace_type: impl Into<String>, rate: f64) -> Self {
        self.per_type.insert(trace_type.into(), rate);
        self
    }

    /// Rate that applies to a trace type.
    pub fn rate_for(&self, trace_type: &str) -> f64 {
        self.per_type
            .get(trace_type)
            .copied()
            .unwrap_or(self.default_rate)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation for file output: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
