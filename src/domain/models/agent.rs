//! Agent descriptor.
//!
//! The descriptor is immutable once built and carries no per-run state, so a
//! single descriptor can take part in several concurrent runs. Whether a
//! run-once agent has already fired for a task is recorded by the
//! environment, not here.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Static description of an agent: what it reads and what it writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique name within a collective
    pub name: String,

    /// Trace types that must be alive before the agent can act
    pub consumes: Vec<String>,

    /// Trace type written by the agent
    pub produces: String,

    /// Fire at most once per task
    #[serde(default)]
    pub run_once: bool,
}

impl AgentSpec {
    /// Create a descriptor. Duplicate consumed types are collapsed, keeping
    /// the first occurrence.
    pub fn new<I, S>(name: impl Into<String>, consumes: I, produces: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for trace_type in consumes {
            let trace_type = trace_type.into();
            if !unique.contains(&trace_type) {
                unique.push(trace_type);
            }
        }

        Self {
            name: name.into(),
            consumes: unique,
            produces: produces.into(),
            run_once: false,
        }
    }

    /// Limit this agent to a single firing per task.
    pub const fn run_once(mut self) -> Self {
        self.run_once = true;
        self
    }

    /// Check the descriptor is usable.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidAgent {
                name: self.name.clone(),
                reason: "name cannot be empty".to_string(),
            });
        }
        if self.produces.trim().is_empty() {
            return Err(DomainError::InvalidAgent {
                name: self.name.clone(),
                reason: "produced trace type cannot be empty".to_string(),
            });
        }
        if self.consumes.iter().any(|t| t.trim().is_empty()) {
            return Err(DomainError::InvalidAgent {
                name: self.name.clone(),
                reason: "consumed trace types cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}
