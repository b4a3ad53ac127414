//! Hierarchical configuration loading.
//!
//! Built-in defaults, then the project file, then the local overrides file,
//! then `STIGMERGY_*` environment variables; later sources win.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project configuration file, relative to the working directory
pub const PROJECT_CONFIG_PATH: &str = ".stigmergy/config.yaml";

/// Optional local overrides, relative to the working directory
pub const LOCAL_CONFIG_PATH: &str = ".stigmergy/local.yaml";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "STIGMERGY_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Decay rate outside `[0, 1]`
    #[error("Invalid decay rate for '{trace_type}': {rate}. Must be between 0.0 and 1.0")]
    InvalidDecayRate {
        /// Trace type the rate applies to, or `default`
        trace_type: String,
        /// Offending rate
        rate: f64,
    },

    /// Zero-length cycle window
    #[error("Invalid max_cycle_history: {0}. Must be at least 1")]
    InvalidCycleHistory(usize),

    /// Zero idle threshold
    #[error("Invalid idle_rounds_threshold: {0}. Must be at least 1")]
    InvalidIdleThreshold(u32),

    /// Zero round budget
    #[error("Invalid max_rounds: {0}. Must be at least 1")]
    InvalidMaxRounds(u32),

    /// Zero agent timeout
    #[error("Invalid agent_timeout_ms: {0}. Must be at least 1")]
    InvalidAgentTimeout(u64),

    /// Unknown log level
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown log format
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Unknown rotation policy
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .stigmergy/config.yaml (project config)
    /// 3. .stigmergy/local.yaml (local overrides, optional)
    /// 4. Environment variables (STIGMERGY_* prefix, `__` between levels)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, then apply environment
    /// overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(PROJECT_CONFIG_PATH))
            .merge(Yaml::file(LOCAL_CONFIG_PATH))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let collective = &config.collective;

        if !(0.0..=1.0).contains(&collective.default_decay_rate) {
            return Err(ConfigError::InvalidDecayRate {
                trace_type: "default".to_string(),
                rate: collective.default_decay_rate,
            });
        }

        // Sorted so the reported offender is stable
        let mut overrides: Vec<_> = collective.decay_rates.iter().collect();
        overrides.sort_by(|a, b| a.0.cmp(b.0));
        if let Some((trace_type, rate)) = overrides
            .into_iter()
            .find(|(_, rate)| !(0.0..=1.0).contains(*rate))
        {
            return Err(ConfigError::InvalidDecayRate {
                trace_type: trace_type.clone(),
                rate: *rate,
            });
        }

        if collective.max_cycle_history == 0 {
            return Err(ConfigError::InvalidCycleHistory(collective.max_cycle_history));
        }

        if collective.idle_rounds_threshold == 0 {
            return Err(ConfigError::InvalidIdleThreshold(
                collective.idle_rounds_threshold,
            ));
        }

        if collective.max_rounds == 0 {
            return Err(ConfigError::InvalidMaxRounds(collective.max_rounds));
        }

        if collective.agent_timeout_ms == 0 {
            return Err(ConfigError::InvalidAgentTimeout(collective.agent_timeout_ms));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        Ok(())
    }
}
