//! Implementation of the `stigmergy run` command.

use anyhow::{Context, Result};
use clap::Args;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::domain::models::{Config, Payload, RunOutcome, RunResult};
use crate::infrastructure::pipeline::PipelineDefinition;
use crate::services::{RunOptions, DEFAULT_GOAL_TYPE};

const RESULT_PREVIEW_LEN: usize = 120;

/// Arguments of `stigmergy run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Pipeline definition (YAML)
    #[arg(short, long)]
    pub pipeline: PathBuf,

    /// Goal text seeded into the environment
    #[arg(short, long)]
    pub goal: String,

    /// Task id (defaults to a fresh UUID)
    #[arg(short, long)]
    pub task: Option<String>,

    /// Type of the seed trace
    #[arg(long, default_value = DEFAULT_GOAL_TYPE)]
    pub goal_type: String,

    /// Round budget (defaults to collective.max_rounds)
    #[arg(short, long)]
    pub max_rounds: Option<u32>,

    /// Keep running when the environment state repeats
    #[arg(long)]
    pub no_cycle_stop: bool,

    /// Trace types to print (comma-separated, defaults to every produced type)
    #[arg(short, long, value_delimiter = ',')]
    pub show: Vec<String>,

    /// Per-agent timeout override in milliseconds
    #[arg(long)]
    pub agent_timeout_ms: Option<u64>,

    /// Also list every stored trace
    #[arg(long)]
    pub observe: bool,
}

/// Agents activated in one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundLog {
    /// Round number, starting at 1
    pub round: u32,
    /// Agents that ran, in registration order
    pub active: Vec<String>,
}

/// Strongest surviving payload of one trace type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShownResult {
    /// Requested trace type
    pub trace_type: String,
    /// Payload, or `None` when no trace of the type survived
    pub payload: Option<Payload>,
}

/// Everything `stigmergy run` reports.
#[derive(Debug, Serialize)]
pub struct RunOutput {
    /// Summary of the run
    pub result: RunResult,
    /// Activation set of every round
    pub round_log: Vec<RoundLog>,
    /// Strongest payload of each shown type
    pub outputs: Vec<ShownResult>,
    /// Trace listing when `--observe` was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observe: Option<String>,
}

fn status_line(result: &RunResult) -> String {
    match result.outcome {
        RunOutcome::Converged => format!("Converged after {} round(s)", result.rounds),
        RunOutcome::CycleDetected => format!("Cycle detected in round {}", result.rounds),
        RunOutcome::Exhausted => format!("Round budget exhausted after {} round(s)", result.rounds),
    }
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut out = format!("Task: {}\n", self.result.task);

        for entry in &self.round_log {
            let active = if entry.active.is_empty() {
                "(idle)".to_string()
            } else {
                entry.active.join(", ")
            };
            let _ = writeln!(out, "Round {}: {active}", entry.round);
        }
        let _ = writeln!(out, "\n{}", status_line(&self.result));

        let mut table = list_table(&["type", "count"]);
        for (trace_type, count) in &self.result.traces.types {
            table.add_row(vec![trace_type.clone(), count.to_string()]);
        }
        let contributors: Vec<&str> = self.result.traces.agents.iter().map(String::as_str).collect();
        let _ = writeln!(
            out,
            "\n{} alive trace(s) from {}:\n{table}",
            self.result.traces.total,
            contributors.join(", ")
        );

        if !self.result.errors.is_empty() {
            let mut errors = list_table(&["round", "agent", "error"]);
            for record in &self.result.errors {
                errors.add_row(vec![
                    record.round.to_string(),
                    record.agent.clone(),
                    truncate(&record.error, RESULT_PREVIEW_LEN),
                ]);
            }
            let _ = writeln!(out, "\n{} agent failure(s):\n{errors}", self.result.errors.len());
        }

        out.push_str("\nResults:");
        for shown in &self.outputs {
            let text = shown.payload.as_ref().map_or_else(
                || "(none)".to_string(),
                |payload| {
                    truncate(
                        &serde_json::Value::Object(payload.clone()).to_string(),
                        RESULT_PREVIEW_LEN,
                    )
                },
            );
            let _ = write!(out, "\n  {}: {text}", shown.trace_type);
        }

        if let Some(listing) = &self.observe {
            let _ = write!(out, "\n\nTraces:\n{listing}");
        }

        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Load the pipeline, run it on the goal and print the outcome.
pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pipeline = PipelineDefinition::load(&args.pipeline)?;

    let mut collective_config = config.collective.clone();
    if let Some(timeout_ms) = args.agent_timeout_ms {
        collective_config = collective_config.with_agent_timeout_ms(timeout_ms);
    }
    let collective = pipeline
        .build(collective_config)
        .context("Failed to build collective from pipeline")?;

    let task = args.task.unwrap_or_else(|| Uuid::new_v4().to_string());

    let round_log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&round_log);
    let mut options = RunOptions::new()
        .with_goal_type(args.goal_type)
        .with_stop_on_cycle(!args.no_cycle_stop)
        .on_round(move |round, active| {
            sink.lock().push(RoundLog {
                round,
                active: active.to_vec(),
            });
        });
    if let Some(max_rounds) = args.max_rounds {
        options = options.with_max_rounds(max_rounds);
    }

    let result = collective
        .run_with(&task, &args.goal, options)
        .await
        .context("Collective run failed")?;

    let show = if args.show.is_empty() {
        produced_types(&pipeline)
    } else {
        args.show
    };
    let outputs = show
        .into_iter()
        .map(|trace_type| ShownResult {
            payload: collective.result(&task, &trace_type),
            trace_type,
        })
        .collect();

    let observe = args
        .observe
        .then(|| collective.environment().observe(&task));

    let round_log = std::mem::take(&mut *round_log.lock());
    let output_data = RunOutput {
        result,
        round_log,
        outputs,
        observe,
    };
    output(&output_data, json_mode);
    Ok(())
}

/// Produced types of a pipeline, in declaration order without repeats.
fn produced_types(pipeline: &PipelineDefinition) -> Vec<String> {
    let mut types: Vec<String> = Vec::new();
    for agent in &pipeline.agents {
        if !types.contains(&agent.produces) {
            types.push(agent.produces.clone());
        }
    }
    types
}
