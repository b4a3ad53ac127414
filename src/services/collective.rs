//! Collective - round-based driver for a set of agents.
//!
//! Each round the collective fingerprints the store, stops on a repeated
//! fingerprint, asks every agent whether it is ready, runs the ready ones
//! concurrently, waits for all of them, and then decays the task's traces.
//! A run ends when enough consecutive rounds find nobody ready, when a state
//! cycle is detected, or when the round budget is spent.
//!
//! Agent failures (errors, timeouts, panics) are contained: each one is
//! recorded on the result and left behind as an `error` trace, and never
//! affects sibling agents or the round itself.

use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentErrorRecord, CollectiveConfig, DecayRates, Payload, RunOutcome, RunResult, TraceSummary,
    ERROR_TRACE_TYPE,
};
use crate::services::agent::Agent;
use crate::services::environment::{Environment, Fingerprint};

/// Agent name recorded on the seed trace of every run.
pub const SEED_AGENT: &str = "user";

/// Default type of the seed trace.
pub const DEFAULT_GOAL_TYPE: &str = "goal";

/// Callback invoked at the start of each round with the round number and
/// the names of the agents about to run.
pub type RoundObserver = Box<dyn Fn(u32, &[String]) + Send + Sync>;

/// Per-run options.
pub struct RunOptions {
    /// Type of the seed trace
    pub goal_type: String,

    /// Round budget; the collective's configured default when unset
    pub max_rounds: Option<u32>,

    /// Stop when a store fingerprint repeats
    pub stop_on_cycle: bool,

    on_round: Option<RoundObserver>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            goal_type: DEFAULT_GOAL_TYPE.to_string(),
            max_rounds: None,
            stop_on_cycle: true,
            on_round: None,
        }
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("goal_type", &self.goal_type)
            .field("max_rounds", &self.max_rounds)
            .field("stop_on_cycle", &self.stop_on_cycle)
            .field("on_round", &self.on_round.is_some())
            .finish()
    }
}

impl RunOptions {
    /// Default options: `goal` seed, configured budget, stop on cycles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Type of the seed trace.
    pub fn with_goal_type(mut self, goal_type: impl Into<String>) -> Self {
        self.goal_type = goal_type.into();
        self
    }

    /// Round budget for this run only.
    pub const fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    /// Whether a repeated fingerprint ends the run.
    pub const fn with_stop_on_cycle(mut self, stop_on_cycle: bool) -> Self {
        self.stop_on_cycle = stop_on_cycle;
        self
    }

    /// Observe each round's activation set. The callback runs synchronously
    /// on the driver and must return quickly.
    pub fn on_round<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, &[String]) + Send + Sync + 'static,
    {
        self.on_round = Some(Box::new(observer));
        self
    }
}

/// Self-organizing collective of agents sharing one environment.
pub struct Collective {
    agents: Vec<Arc<Agent>>,
    env: Arc<Environment>,
    config: CollectiveConfig,
    decay: DecayRates,
}

impl Default for Collective {
    fn default() -> Self {
        Self::new()
    }
}

impl Collective {
    /// Create a collective with the default configuration.
    pub fn new() -> Self {
        Self::from_valid(CollectiveConfig::default())
    }

    /// Create a collective with an explicit configuration.
    ///
    /// Fails with [`DomainError::ValidationFailed`] when the configuration
    /// holds an out-of-range decay rate or a zero window, threshold, budget
    /// or timeout.
    pub fn with_config(config: CollectiveConfig) -> DomainResult<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: CollectiveConfig) -> Self {
        let decay = config.decay();
        Self {
            agents: Vec::new(),
            env: Arc::new(Environment::new()),
            config,
            decay,
        }
    }

    /// Register an agent. Chainable.
    pub fn add(&mut self, agent: Agent) -> DomainResult<&mut Self> {
        agent.spec().validate()?;
        if self.agents.iter().any(|a| a.name() == agent.name()) {
            return Err(DomainError::DuplicateAgent(agent.name().to_string()));
        }
        debug!(agent = %agent.name(), "agent registered");
        self.agents.push(Arc::new(agent));
        Ok(self)
    }

    /// Names of the registered agents, in registration order.
    pub fn agent_names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name().to_string()).collect()
    }

    /// The shared trace store.
    pub const fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    /// Run until convergence with default options.
    pub async fn run(&self, task: &str, goal: &str) -> DomainResult<RunResult> {
        self.run_with(task, goal, RunOptions::default()).await
    }

    /// Run until convergence, a detected cycle, or the round budget.
    #[instrument(skip(self, goal, options), fields(task = %task))]
    pub async fn run_with(
        &self,
        task: &str,
        goal: &str,
        options: RunOptions,
    ) -> DomainResult<RunResult> {
        if task.trim().is_empty() {
            return Err(DomainError::InvalidTaskId(task.to_string()));
        }
        let max_rounds = options.max_rounds.unwrap_or(self.config.max_rounds);
        if max_rounds == 0 {
            return Err(DomainError::InvalidRoundBudget(max_rounds));
        }

        info!(
            max_rounds,
            agents = self.agents.len(),
            goal_type = %options.goal_type,
            "starting collective run"
        );

        let mut seed = Payload::new();
        seed.insert("goal".to_string(), Value::String(goal.to_string()));
        self.env.add_init(SEED_AGENT, task, &options.goal_type, seed);

        let mut history: VecDeque<Fingerprint> =
            VecDeque::with_capacity(self.config.max_cycle_history + 1);
        let mut errors = Vec::new();
        let mut outcome = RunOutcome::Exhausted;
        let mut idle_rounds = 0u32;
        let mut round = 0u32;

        while round < max_rounds {
            round += 1;

            let fingerprint = self.env.snapshot(task);
            if options.stop_on_cycle && history.contains(&fingerprint) {
                info!(round, "state cycle detected");
                outcome = RunOutcome::CycleDetected;
                break;
            }
            history.push_back(fingerprint);
            while history.len() > self.config.max_cycle_history {
                history.pop_front();
            }

            let active: Vec<Arc<Agent>> = self
                .agents
                .iter()
                .filter(|agent| agent.can_activate(&self.env, task))
                .cloned()
                .collect();
            let names: Vec<String> = active.iter().map(|a| a.name().to_string()).collect();
            debug!(round, active = ?names, "round started");

            if let Some(observer) = &options.on_round {
                observer(round, &names);
            }

            if active.is_empty() {
                idle_rounds += 1;
                if idle_rounds >= self.config.idle_rounds_threshold {
                    info!(round, idle_rounds, "collective converged");
                    outcome = RunOutcome::Converged;
                    break;
                }
            } else {
                idle_rounds = 0;
                errors.extend(self.execute_round(task, round, &active).await);
            }

            self.env.decay_async(task, &self.decay).await;
        }

        if outcome == RunOutcome::Exhausted {
            warn!(round, "round budget exhausted before convergence");
        }

        let traces = TraceSummary::from_traces(&self.env.read(task, None));
        Ok(RunResult {
            task: task.to_string(),
            converged: outcome != RunOutcome::Exhausted,
            rounds: round,
            cycle_detected: outcome == RunOutcome::CycleDetected,
            outcome,
            traces,
            errors,
        })
    }

    /// Run every active agent concurrently and wait for all of them.
    /// Returns the failures, in registration order.
    async fn execute_round(
        &self,
        task: &str,
        round: u32,
        active: &[Arc<Agent>],
    ) -> Vec<AgentErrorRecord> {
        let timeout_ms = self.config.agent_timeout_ms;

        // Dropping the set aborts agents still in flight.
        let mut set = JoinSet::new();
        for (index, agent) in active.iter().enumerate() {
            let agent = Arc::clone(agent);
            let env = Arc::clone(&self.env);
            let task = task.to_string();
            set.spawn(async move {
                let outcome = AssertUnwindSafe(execute_agent(&agent, &env, &task, timeout_ms))
                    .catch_unwind()
                    .await;
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<DomainResult<()>>> = active.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(result))) => outcomes[index] = Some(result),
                Ok((index, Err(payload))) => {
                    outcomes[index] = Some(Err(DomainError::AgentPanicked {
                        agent: active[index].name().to_string(),
                        message: panic_message(&*payload),
                    }));
                }
                Err(join_error) => warn!(round, error = %join_error, "agent task did not complete"),
            }
        }

        let mut records = Vec::new();
        for (agent, outcome) in active.iter().zip(outcomes) {
            let error = match outcome {
                Some(Ok(())) => continue,
                Some(Err(e)) => e,
                None => DomainError::AgentPanicked {
                    agent: agent.name().to_string(),
                    message: "task was cancelled".to_string(),
                },
            };

            let message = error.to_string();
            warn!(agent = %agent.name(), round, error = %message, "agent failed");

            let mut payload = Payload::new();
            payload.insert("error".to_string(), Value::String(message.clone()));
            payload.insert("agent".to_string(), Value::String(agent.name().to_string()));
            self.env
                .add(agent.name(), task, ERROR_TRACE_TYPE, payload)
                .await;

            records.push(AgentErrorRecord {
                agent: agent.name().to_string(),
                error: message,
                round,
            });
        }
        records
    }

    /// Payload of the strongest surviving trace of a type.
    pub fn result(&self, task: &str, trace_type: &str) -> Option<Payload> {
        self.env.strongest_data(task, trace_type)
    }

    /// [`Collective::result`] for several types at once.
    pub fn results(&self, task: &str, trace_types: &[&str]) -> HashMap<String, Option<Payload>> {
        trace_types
            .iter()
            .map(|t| ((*t).to_string(), self.result(task, t)))
            .collect()
    }
}

async fn execute_agent(
    agent: &Agent,
    env: &Environment,
    task: &str,
    timeout_ms: u64,
) -> DomainResult<()> {
    match timeout(Duration::from_millis(timeout_ms), agent.act(env, task)).await {
        Ok(result) => result.map(|_| ()),
        Err(_) => Err(DomainError::AgentTimedOut {
            agent: agent.name().to_string(),
            timeout_ms,
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
