//! Outcome of a collective run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::trace::Trace;

/// Terminal state of the round loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Enough consecutive rounds had no active agent
    Converged,
    /// A store fingerprint repeated inside the history window
    CycleDetected,
    /// The round budget ran out first
    Exhausted,
}

impl RunOutcome {
    /// Snake-case name, as serialized.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::CycleDetected => "cycle_detected",
            Self::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contained agent failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentErrorRecord {
    /// Agent that failed
    pub agent: String,
    /// Rendered error message
    pub error: String,
    /// Round the failure happened in, starting at 1
    pub round: u32,
}

/// Counts of the traces still alive when a run ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSummary {
    /// Alive trace count per type
    pub types: BTreeMap<String, usize>,
    /// Agents that left at least one alive trace
    pub agents: BTreeSet<String>,
    /// Total alive traces
    pub total: usize,
}

impl TraceSummary {
    /// Summarize a sequence of alive traces.
    pub fn from_traces<'a>(traces: impl IntoIterator<Item = &'a Trace>) -> Self {
        let mut summary = Self::default();
        for trace in traces {
            *summary.types.entry(trace.trace_type.clone()).or_insert(0) += 1;
            summary.agents.insert(trace.agent.clone());
            summary.total += 1;
        }
        summary
    }
}

/// Result of a collective run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Task the run worked on
    pub task: String,
    /// False only when the round budget ran out
    pub converged: bool,
    /// Rounds started, including the one that ended the run
    pub rounds: u32,
    /// Whether the run stopped on a repeated fingerprint
    pub cycle_detected: bool,
    /// How the run ended
    pub outcome: RunOutcome,
    /// Alive traces at the end of the run
    pub traces: TraceSummary,
    /// Contained agent failures, in the order they occurred
    pub errors: Vec<AgentErrorRecord>,
}

impl RunResult {
    /// Whether any agent failed during the run.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
