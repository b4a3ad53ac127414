//! Agent - a named capability that reacts to the environment.
//!
//! An agent pairs an immutable [`AgentSpec`] with an [`AgentAction`].
//! Readiness is derived purely from what is alive in the environment: every
//! consumed type must be present and the produced type must be absent.

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::adapters::actions::FnAction;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentSpec, Payload};
use crate::domain::ports::{normalize_outcome, AgentAction, Context};
use crate::services::environment::Environment;

/// An agent registered with a collective.
#[derive(Clone)]
pub struct Agent {
    spec: AgentSpec,
    action: Arc<dyn AgentAction>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent").field("spec", &self.spec).finish_non_exhaustive()
    }
}

impl Agent {
    /// Create an agent from a descriptor and its action.
    pub fn new(spec: AgentSpec, action: impl AgentAction + 'static) -> Self {
        Self {
            spec,
            action: Arc::new(action),
        }
    }

    /// Create an agent whose action is an async closure.
    ///
    /// ```ignore
    /// let analyzer = Agent::from_fn(
    ///     AgentSpec::new("analyzer", ["goal"], "analysis"),
    ///     |ctx| async move { Ok(json!({"analysis": ctx["goal"]["goal"]})) },
    /// );
    /// ```
    pub fn from_fn<F, Fut>(spec: AgentSpec, f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::new(spec, FnAction::new(f))
    }

    /// Unique agent name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Activation descriptor.
    pub const fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    /// Whether the agent should act on this task now.
    ///
    /// False when a run-once agent already fired for the task, when any
    /// consumed type has no alive trace, or when an alive trace of the
    /// produced type exists. Invalidated output is not alive, so it does not
    /// block re-computation.
    pub fn can_activate(&self, env: &Environment, task: &str) -> bool {
        if self.spec.run_once && env.has_fired(task, &self.spec.name) {
            return false;
        }

        if !self
            .spec
            .consumes
            .iter()
            .all(|trace_type| env.has_alive(task, trace_type))
        {
            return false;
        }

        !env.has_alive(task, &self.spec.produces)
    }

    /// Payload of the strongest alive trace of each consumed type. Types
    /// without an alive trace are left out.
    pub fn build_context(&self, env: &Environment, task: &str) -> Context {
        self.spec
            .consumes
            .iter()
            .filter_map(|trace_type| {
                env.strongest_data(task, trace_type)
                    .map(|payload| (trace_type.clone(), payload))
            })
            .collect()
    }

    /// Run the action and leave its output as a trace of the produced type.
    pub async fn act(&self, env: &Environment, task: &str) -> DomainResult<Payload> {
        let context = self.build_context(env, task);
        debug!(agent = %self.spec.name, task, inputs = context.len(), "agent acting");

        let outcome = self
            .action
            .invoke(context)
            .await
            .map_err(|e| DomainError::ActionFailed {
                agent: self.spec.name.clone(),
                message: format!("{e:#}"),
            })?;

        let payload = normalize_outcome(outcome);
        env.add(&self.spec.name, task, &self.spec.produces, payload.clone())
            .await;

        if self.spec.run_once {
            env.record_fire(task, &self.spec.name);
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::environment::InvalidateFilter;
    use serde_json::json;

    fn echo(spec: AgentSpec) -> Agent {
        Agent::from_fn(spec, |ctx| async move { Ok(json!({"inputs": ctx.len()})) })
    }

    fn seed(env: &Environment, task: &str, trace_type: &str) {
        env.add_init("user", task, trace_type, Payload::new());
    }

    #[test]
    fn test_cannot_activate_without_inputs() {
        let env = Environment::new();
        let agent = echo(AgentSpec::new("combiner", ["a", "b"], "combined"));
        assert!(!agent.can_activate(&env, "task"));

        seed(&env, "task", "a");
        assert!(!agent.can_activate(&env, "task"));

        seed(&env, "task", "b");
        assert!(agent.can_activate(&env, "task"));
    }

    #[test]
    fn test_agent_without_inputs_activates_until_output_exists() {
        let env = Environment::new();
        let agent = echo(AgentSpec::new("source", Vec::<String>::new(), "out"));
        assert!(agent.can_activate(&env, "task"));
        seed(&env, "task", "out");
        assert!(!agent.can_activate(&env, "task"));
    }

    #[test]
    fn test_alive_output_blocks_and_invalidation_unblocks() {
        let env = Environment::new();
        let agent = echo(AgentSpec::new("analyzer", ["goal"], "analysis"));
        seed(&env, "task", "goal");
        seed(&env, "task", "analysis");
        assert!(!agent.can_activate(&env, "task"));

        env.invalidate("task", &InvalidateFilter::by_type("analysis"));
        assert!(agent.can_activate(&env, "task"));
    }

    #[test]
    fn test_invalidated_input_blocks() {
        let env = Environment::new();
        let agent = echo(AgentSpec::new("analyzer", ["goal"], "analysis"));
        seed(&env, "task", "goal");
        env.invalidate("task", &InvalidateFilter::by_type("goal"));
        assert!(!agent.can_activate(&env, "task"));
    }

    #[test]
    fn test_build_context_uses_strongest_and_omits_missing() {
        let env = Environment::new();
        env.add_init("u", "task", "goal", normalize_outcome(json!({"v": 1})));
        env.add_init("u", "task", "goal", normalize_outcome(json!({"v": 2})));
        env.set_strength("task", 0, 0.4);

        let agent = echo(AgentSpec::new("x", ["goal", "missing"], "out"));
        let context = agent.build_context(&env, "task");
        assert_eq!(context.len(), 1);
        assert_eq!(context["goal"]["v"], json!(2));
    }

    #[tokio::test]
    async fn test_act_writes_normalized_output() {
        let env = Environment::new();
        seed(&env, "task", "goal");
        let agent = Agent::from_fn(AgentSpec::new("counter", ["goal"], "count"), |_| async {
            Ok(json!(7))
        });

        let payload = agent.act(&env, "task").await.unwrap();
        assert_eq!(payload["result"], json!(7));

        let trace = env.strongest("task", "count").unwrap();
        assert_eq!(trace.agent, "counter");
        assert_eq!(trace.payload["result"], json!(7));
        assert!(!agent.can_activate(&env, "task"));
    }

    #[tokio::test]
    async fn test_act_failure_leaves_no_output() {
        let env = Environment::new();
        seed(&env, "task", "goal");
        let agent = Agent::from_fn(AgentSpec::new("broken", ["goal"], "out"), |_| async {
            Err(anyhow::anyhow!("upstream unavailable"))
        });

        let err = agent.act(&env, "task").await.unwrap_err();
        assert!(matches!(err, DomainError::ActionFailed { ref agent, .. } if agent == "broken"));
        assert!(err.to_string().contains("upstream unavailable"));
        assert!(env.read("task", Some("out")).is_empty());
    }

    #[tokio::test]
    async fn test_run_once_is_scoped_per_task() {
        let env = Environment::new();
        let agent = echo(AgentSpec::new("init", ["goal"], "config").run_once());
        seed(&env, "one", "goal");
        seed(&env, "two", "goal");

        agent.act(&env, "one").await.unwrap();
        env.invalidate("one", &InvalidateFilter::by_type("config"));
        assert!(!agent.can_activate(&env, "one"));
        assert!(agent.can_activate(&env, "two"));
    }
}
