//! Implementation of the `stigmergy config` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

/// Arguments of `stigmergy config`.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {}

/// Effective configuration, as printed.
#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    /// Merged configuration
    pub config: Config,
    #[serde(skip)]
    yaml: String,
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        self.yaml.trim_end().to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}

/// Print the effective configuration.
pub fn execute(_args: ConfigArgs, config: &Config, json_mode: bool) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to render configuration")?;
    let output_data = ConfigOutput {
        config: config.clone(),
        yaml,
    };
    output(&output_data, json_mode);
    Ok(())
}
