//! YAML pipeline definitions.
//!
//! A pipeline file declares a set of template-rendering agents and optional
//! decay rate overrides:
//!
//! ```yaml
//! decay_rates:
//!   goal: 0.0
//! agents:
//!   - name: analyzer
//!     consumes: [goal]
//!     produces: analysis
//!     template: "Analyzed: {goal.goal}"
//!   - name: planner
//!     consumes: [analysis]
//!     produces: plan
//!     template: "Plan for {analysis.analysis}"
//!     delay_ms: 50
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::adapters::actions::TemplateAction;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentSpec, CollectiveConfig};
use crate::services::{Agent, Collective};

/// A pipeline of template agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Per-type decay rates layered over the configured ones
    #[serde(default)]
    pub decay_rates: HashMap<String, f64>,

    /// Agents in registration order
    pub agents: Vec<PipelineAgent>,
}

/// One agent of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineAgent {
    /// Unique agent name
    pub name: String,

    /// Trace types that must be alive before the agent runs
    #[serde(default)]
    pub consumes: Vec<String>,

    /// Trace type the agent leaves behind
    pub produces: String,

    /// Fire at most once per task
    #[serde(default)]
    pub run_once: bool,

    /// Output template, see [`crate::adapters::actions::render_template`]
    pub template: String,

    /// Payload key of the rendered text; defaults to the produced type
    #[serde(default)]
    pub output_key: Option<String>,

    /// Simulated work before rendering
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

impl PipelineAgent {
    /// Build the runtime agent.
    pub fn to_agent(&self) -> Agent {
        let mut spec = AgentSpec::new(&self.name, self.consumes.iter().cloned(), &self.produces);
        if self.run_once {
            spec = spec.run_once();
        }

        let output_key = self.output_key.as_deref().unwrap_or(&self.produces);
        let mut action = TemplateAction::new(&self.template, output_key);
        if let Some(ms) = self.delay_ms {
            action = action.with_delay(Duration::from_millis(ms));
        }

        Agent::new(spec, action)
    }
}

impl PipelineDefinition {
    /// Parse a pipeline from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let pipeline: Self = serde_yaml::from_str(yaml).context("Invalid pipeline YAML")?;
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Read and parse a pipeline file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline {}", path.display()))?;
        Self::from_yaml(&yaml).with_context(|| format!("Failed to load pipeline {}", path.display()))
    }

    /// Check agent descriptors and decay rates.
    pub fn validate(&self) -> DomainResult<()> {
        if self.agents.is_empty() {
            return Err(DomainError::ValidationFailed(
                "pipeline declares no agents".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if !seen.insert(agent.name.as_str()) {
                return Err(DomainError::DuplicateAgent(agent.name.clone()));
            }
        }

        if let Some((trace_type, rate)) = self
            .decay_rates
            .iter()
            .find(|(_, rate)| !(0.0..=1.0).contains(*rate))
        {
            return Err(DomainError::ValidationFailed(format!(
                "decay rate for '{trace_type}' must be between 0.0 and 1.0, got {rate}"
            )));
        }

        Ok(())
    }

    /// Build a collective running this pipeline on top of `base`.
    pub fn build(&self, base: CollectiveConfig) -> DomainResult<Collective> {
        let config = self
            .decay_rates
            .iter()
            .fold(base, |config, (trace_type, rate)| {
                config.with_decay_rate(trace_type, *rate)
            });

        let mut collective = Collective::with_config(config)?;
        for agent in &self.agents {
            collective.add(agent.to_agent())?;
        }
        Ok(collective)
    }
}
