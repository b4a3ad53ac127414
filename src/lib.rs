//! Stigmergy - agents coordinating through decaying traces
//!
//! Independent agents never call each other. Each one declares which trace
//! types it consumes and which one it produces; it becomes ready when all of
//! its inputs are alive in the shared environment and its output is not. A
//! collective drives rounds of ready agents until nothing is left to do, the
//! environment starts repeating itself, or the round budget runs out.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): traces, agent descriptors, run results,
//!   configuration and the agent action port
//! - **Service Layer** (`services`): the environment, agents and the round
//!   driver
//! - **Adapters** (`adapters`): closure and template agent actions
//! - **Infrastructure Layer** (`infrastructure`): configuration loading,
//!   logging, YAML pipelines
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use serde_json::json;
//! use stigmergy::{Agent, AgentSpec, Collective};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut collective = Collective::new();
//!     collective.add(Agent::from_fn(
//!         AgentSpec::new("analyzer", ["goal"], "analysis"),
//!         |ctx| async move { Ok(json!({"analysis": ctx["goal"]["goal"]})) },
//!     ))?;
//!
//!     let result = collective.run("task-1", "Build an API").await?;
//!     assert!(result.converged);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::actions::{FnAction, TemplateAction};
pub use domain::models::{
    AgentErrorRecord, AgentSpec, CollectiveConfig, Config, DecayRates, LoggingConfig, Payload,
    RunOutcome, RunResult, Trace, TraceSummary,
};
pub use domain::ports::{AgentAction, Context};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::pipeline::PipelineDefinition;
pub use services::{Agent, Collective, Environment, Fingerprint, InvalidateFilter, RunOptions};
