//! Environment - the shared, task-scoped trace store.
//!
//! Each task id owns an isolated, creation-ordered collection of traces.
//! Agents never talk to each other directly: they read what others left here
//! and leave their own output behind.
//!
//! Locking: trace data lives behind a `parking_lot::RwLock` that is held for
//! one read or one mutation at a time and never across an `.await`. The async
//! mutators ([`Environment::add`], [`Environment::decay_async`]) additionally
//! queue on a tokio writer gate so concurrently acting agents serialize their
//! writes in arrival order. The synchronous [`Environment::add_init`] and
//! [`Environment::decay`] skip the gate and are meant for setup and tests,
//! before or outside the concurrent round loop.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{DecayRates, Payload, Trace, ERROR_TRACE_TYPE};

/// Reduced view of one alive trace, as far as scheduling is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceSignature {
    /// Type of the trace
    pub trace_type: String,
    /// Agent that left the trace
    pub agent: String,
    /// Strength rounded to one decimal, in tenths
    pub strength_bucket: i64,
}

/// Structural fingerprint of a task's alive traces.
///
/// Two fingerprints are equal exactly when their ordered signature
/// sequences are equal; there is no hashing step that could collide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<TraceSignature>);

impl Fingerprint {
    /// Build a fingerprint from alive traces in creation order.
    pub fn from_traces<'a>(traces: impl IntoIterator<Item = &'a Trace>) -> Self {
        Self(
            traces
                .into_iter()
                .map(|t| TraceSignature {
                    trace_type: t.trace_type.clone(),
                    agent: t.agent.clone(),
                    strength_bucket: t.strength_bucket(),
                })
                .collect(),
        )
    }

    /// Signatures in creation order.
    pub fn signatures(&self) -> &[TraceSignature] {
        &self.0
    }

    /// Number of alive traces fingerprinted.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the task had no alive traces.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which traces an invalidation applies to. Filters combine with AND; an
/// empty filter matches every trace of the task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidateFilter {
    /// Only traces left by this agent
    pub agent: Option<String>,
    /// Only traces of this type
    pub trace_type: Option<String>,
}

impl InvalidateFilter {
    /// Match every trace.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match traces left by one agent.
    pub fn by_agent(agent: impl Into<String>) -> Self {
        Self {
            agent: Some(agent.into()),
            trace_type: None,
        }
    }

    /// Match traces of one type.
    pub fn by_type(trace_type: impl Into<String>) -> Self {
        Self {
            agent: None,
            trace_type: Some(trace_type.into()),
        }
    }

    /// Further restrict to one type.
    pub fn and_type(mut self, trace_type: impl Into<String>) -> Self {
        self.trace_type = Some(trace_type.into());
        self
    }

    fn matches(&self, trace: &Trace) -> bool {
        self.agent.as_deref().is_none_or(|a| trace.agent == a)
            && self.trace_type.as_deref().is_none_or(|t| trace.trace_type == t)
    }
}

/// Shared memory where agents coordinate through traces.
#[derive(Debug, Default)]
pub struct Environment {
    traces: RwLock<HashMap<String, Vec<Trace>>>,
    /// (task, agent) pairs for run-once agents that already fired
    fired: RwLock<HashSet<(String, String)>>,
    write_gate: Mutex<()>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave a trace. Serialized with the other async mutators.
    pub async fn add(
        &self,
        agent: &str,
        task: &str,
        trace_type: &str,
        payload: Payload,
    ) -> Trace {
        let _gate = self.write_gate.lock().await;
        self.push(Trace::new(agent, task, trace_type, payload))
    }

    /// Leave a trace without queueing on the writer gate.
    ///
    /// Intended for seeding a task before its round loop starts.
    pub fn add_init(&self, agent: &str, task: &str, trace_type: &str, payload: Payload) -> Trace {
        self.push(Trace::new(agent, task, trace_type, payload))
    }

    fn push(&self, trace: Trace) -> Trace {
        trace!(
            task = %trace.task,
            agent = %trace.agent,
            trace_type = %trace.trace_type,
            "trace added"
        );
        self.traces
            .write()
            .entry(trace.task.clone())
            .or_default()
            .push(trace.clone());
        trace
    }

    /// Alive traces of a task in creation order, optionally of one type.
    pub fn read(&self, task: &str, trace_type: Option<&str>) -> Vec<Trace> {
        self.traces.read().get(task).map_or_else(Vec::new, |traces| {
            traces
                .iter()
                .filter(|t| t.is_alive())
                .filter(|t| trace_type.is_none_or(|ty| t.trace_type == ty))
                .cloned()
                .collect()
        })
    }

    /// Whether at least one alive trace of the type exists.
    pub fn has_alive(&self, task: &str, trace_type: &str) -> bool {
        self.traces.read().get(task).is_some_and(|traces| {
            traces
                .iter()
                .any(|t| t.trace_type == trace_type && t.is_alive())
        })
    }

    /// Alive trace of the type with the highest strength. Ties go to the
    /// earliest created.
    pub fn strongest(&self, task: &str, trace_type: &str) -> Option<Trace> {
        let mut best: Option<Trace> = None;
        for candidate in self.read(task, Some(trace_type)) {
            if best.as_ref().is_none_or(|b| candidate.strength > b.strength) {
                best = Some(candidate);
            }
        }
        best
    }

    /// Alive trace of the type with the smallest age. Ties go to the
    /// earliest created.
    pub fn freshest(&self, task: &str, trace_type: &str) -> Option<Trace> {
        let mut best: Option<Trace> = None;
        for candidate in self.read(task, Some(trace_type)) {
            if best
                .as_ref()
                .is_none_or(|b| candidate.created_at > b.created_at)
            {
                best = Some(candidate);
            }
        }
        best
    }

    /// Payload of [`Environment::strongest`].
    pub fn strongest_data(&self, task: &str, trace_type: &str) -> Option<Payload> {
        self.strongest(task, trace_type).map(|t| t.payload)
    }

    /// Payload of [`Environment::freshest`].
    pub fn freshest_data(&self, task: &str, trace_type: &str) -> Option<Payload> {
        self.freshest(task, trace_type).map(|t| t.payload)
    }

    /// Mark matching traces invalid. Returns how many were newly invalidated.
    ///
    /// Invalidated traces stop counting as alive immediately but stay stored
    /// until the next decay pass.
    pub fn invalidate(&self, task: &str, filter: &InvalidateFilter) -> usize {
        let mut store = self.traces.write();
        let Some(traces) = store.get_mut(task) else {
            return 0;
        };

        let mut count = 0;
        for trace in traces.iter_mut().filter(|t| filter.matches(t)) {
            if !trace.invalidated {
                trace.invalidate();
                count += 1;
            }
        }
        debug!(task, agent = ?filter.agent, trace_type = ?filter.trace_type, count, "traces invalidated");
        count
    }

    /// Strengthen every alive trace of a type. Returns how many were touched.
    pub fn reinforce(&self, task: &str, trace_type: &str, amount: f64) -> DomainResult<usize> {
        if amount.is_nan() || amount < 0.0 {
            return Err(DomainError::InvalidReinforcement(amount));
        }

        let mut store = self.traces.write();
        let Some(traces) = store.get_mut(task) else {
            return Ok(0);
        };

        let mut count = 0;
        for trace in traces
            .iter_mut()
            .filter(|t| t.trace_type == trace_type && t.is_alive())
        {
            trace.reinforce(amount);
            count += 1;
        }
        debug!(task, trace_type, amount, count, "traces reinforced");
        Ok(count)
    }

    /// Decay every trace of a task by its type's rate, then drop the dead
    /// ones. Returns how many traces were pruned.
    pub fn decay(&self, task: &str, rates: &DecayRates) -> usize {
        let mut store = self.traces.write();
        let Some(traces) = store.get_mut(task) else {
            return 0;
        };

        for trace in traces.iter_mut() {
            trace.decay(rates.rate_for(&trace.trace_type));
        }

        let before = traces.len();
        traces.retain(Trace::is_alive);
        let pruned = before - traces.len();
        debug!(task, remaining = traces.len(), pruned, "decay applied");
        pruned
    }

    /// [`Environment::decay`], serialized with the other async mutators.
    pub async fn decay_async(&self, task: &str, rates: &DecayRates) -> usize {
        let _gate = self.write_gate.lock().await;
        self.decay(task, rates)
    }

    /// Fingerprint of the task's alive traces, for cycle detection.
    pub fn snapshot(&self, task: &str) -> Fingerprint {
        Fingerprint::from_traces(&self.read(task, None))
    }

    /// Whether any alive error trace exists for the task.
    pub fn has_errors(&self, task: &str) -> bool {
        self.has_alive(task, ERROR_TRACE_TYPE)
    }

    /// Payloads of the task's alive error traces.
    pub fn errors(&self, task: &str) -> Vec<Payload> {
        self.read(task, Some(ERROR_TRACE_TYPE))
            .into_iter()
            .map(|t| t.payload)
            .collect()
    }

    /// Remove every trace and fire record of a task.
    pub fn clear(&self, task: &str) {
        self.traces.write().remove(task);
        self.fired.write().retain(|(t, _)| t != task);
        debug!(task, "task cleared");
    }

    /// Number of stored traces for a task, dead ones included.
    pub fn trace_count(&self, task: &str) -> usize {
        self.traces.read().get(task).map_or(0, Vec::len)
    }

    /// Record that a run-once agent fired for a task.
    pub fn record_fire(&self, task: &str, agent: &str) {
        self.fired
            .write()
            .insert((task.to_string(), agent.to_string()));
    }

    /// Whether a run-once agent already fired for a task.
    pub fn has_fired(&self, task: &str, agent: &str) -> bool {
        self.fired
            .read()
            .contains(&(task.to_string(), agent.to_string()))
    }

    /// Human-readable listing of every stored trace, alive or not.
    pub fn observe(&self, task: &str) -> String {
        let store = self.traces.read();
        let traces = match store.get(task) {
            Some(traces) if !traces.is_empty() => traces,
            _ => return "(no traces)".to_string(),
        };

        let mut out = String::new();
        for (i, t) in traces.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let status = if t.is_alive() { "✓" } else { "✗" };
            let _ = write!(
                out,
                "{status} [{}] {} (str={:.2}, age={:.1}s)",
                t.trace_type,
                t.agent,
                t.strength,
                t.age_secs()
            );
        }
        out
    }

    /// Test-only direct access to a stored trace's strength.
    #[cfg(test)]
    pub(crate) fn set_strength(&self, task: &str, index: usize, strength: f64) {
        if let Some(trace) = self
            .traces
            .write()
            .get_mut(task)
            .and_then(|traces| traces.get_mut(index))
        {
            trace.strength = strength;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Payload {
        crate::domain::ports::normalize_outcome(value)
    }

    #[test]
    fn test_read_filters_by_type_in_creation_order() {
        let env = Environment::new();
        env.add_init("a", "task", "data", payload(json!({"n": 1})));
        env.add_init("b", "task", "other", payload(json!({"n": 2})));
        env.add_init("c", "task", "data", payload(json!({"n": 3})));

        let all = env.read("task", None);
        assert_eq!(all.len(), 3);
        let agents: Vec<&str> = all.iter().map(|t| t.agent.as_str()).collect();
        assert_eq!(agents, vec!["a", "b", "c"]);

        let data = env.read("task", Some("data"));
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].payload["n"], json!(1));
        assert_eq!(data[1].payload["n"], json!(3));
    }

    #[test]
    fn test_tasks_are_isolated() {
        let env = Environment::new();
        env.add_init("a", "one", "data", Payload::new());
        assert!(env.read("two", None).is_empty());
        assert!(env.strongest("two", "data").is_none());
        assert_eq!(env.trace_count("one"), 1);
        assert_eq!(env.trace_count("two"), 0);
    }

    #[test]
    fn test_strongest_returns_highest_strength() {
        let env = Environment::new();
        env.add_init("agent1", "task", "data", payload(json!({"version": 1})));
        env.add_init("agent2", "task", "data", payload(json!({"version": 2})));
        env.set_strength("task", 0, 0.5);
        env.set_strength("task", 1, 0.9);

        let strongest = env.strongest("task", "data").expect("alive trace");
        assert_eq!(strongest.payload["version"], json!(2));
        assert_eq!(
            env.strongest_data("task", "data").unwrap()["version"],
            json!(2)
        );
    }

    #[test]
    fn test_strongest_tie_goes_to_earliest() {
        let env = Environment::new();
        env.add_init("first", "task", "data", Payload::new());
        env.add_init("second", "task", "data", Payload::new());
        env.add_init("third", "task", "data", Payload::new());

        for _ in 0..3 {
            assert_eq!(env.strongest("task", "data").unwrap().agent, "first");
        }
    }

    #[test]
    fn test_freshest_prefers_latest_creation() {
        let env = Environment::new();
        env.add_init("old", "task", "data", Payload::new());
        std::thread::sleep(std::time::Duration::from_millis(5));
        env.add_init("new", "task", "data", payload(json!({"v": "new"})));

        assert_eq!(env.freshest("task", "data").unwrap().agent, "new");
        assert_eq!(env.freshest_data("task", "data").unwrap()["v"], json!("new"));
    }

    #[test]
    fn test_invalidate_marks_traces() {
        let env = Environment::new();
        env.add_init("agent1", "task", "output", payload(json!({"value": 1})));
        assert!(env.strongest("task", "output").unwrap().is_alive());

        let count = env.invalidate("task", &InvalidateFilter::by_type("output"));
        assert_eq!(count, 1);
        assert!(env.strongest("task", "output").is_none());

        // Invalidation alone does not prune
        assert_eq!(env.trace_count("task"), 1);
        env.decay("task", &DecayRates::default());
        assert_eq!(env.trace_count("task"), 0);
    }

    #[test]
    fn test_invalidate_filters_combine() {
        let env = Environment::new();
        env.add_init("a", "task", "x", Payload::new());
        env.add_init("a", "task", "y", Payload::new());
        env.add_init("b", "task", "x", Payload::new());

        let count = env.invalidate("task", &InvalidateFilter::by_agent("a").and_type("x"));
        assert_eq!(count, 1);
        let remaining: Vec<(String, String)> = env
            .read("task", None)
            .into_iter()
            .map(|t| (t.agent, t.trace_type))
            .collect();
        assert_eq!(
            remaining,
            vec![
                ("a".to_string(), "y".to_string()),
                ("b".to_string(), "x".to_string())
            ]
        );

        // Already invalidated traces are not counted again
        assert_eq!(env.invalidate("task", &InvalidateFilter::all()), 2);
        assert!(env.read("task", None).is_empty());
    }

    #[test]
    fn test_reinforce_caps_and_skips_dead() {
        let env = Environment::new();
        env.add_init("a", "task", "data", Payload::new());
        env.add_init("b", "task", "data", Payload::new());
        env.set_strength("task", 0, 0.5);
        env.invalidate("task", &InvalidateFilter::by_agent("b"));

        let touched = env.reinforce("task", "data", 0.3).unwrap();
        assert_eq!(touched, 1);
        let trace = env.strongest("task", "data").unwrap();
        assert!((trace.strength - 0.8).abs() < 1e-12);

        env.reinforce("task", "data", 0.3).unwrap();
        let trace = env.strongest("task", "data").unwrap();
        assert!((trace.strength - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reinforce_rejects_negative_amount() {
        let env = Environment::new();
        env.add_init("a", "task", "data", Payload::new());
        assert!(matches!(
            env.reinforce("task", "data", -0.1),
            Err(DomainError::InvalidReinforcement(_))
        ));
    }

    #[test]
    fn test_decay_weakens_traces() {
        let env = Environment::new();
        env.add_init("agent1", "task", "data", payload(json!({"value": 1})));

        env.decay("task", &DecayRates::default().with("data", 0.5));

        let trace = env.strongest("task", "data").unwrap();
        assert!((trace.strength - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_decay_uses_default_rate_and_prunes() {
        let env = Environment::new();
        env.add_init("a", "task", "data", Payload::new());
        env.add_init("b", "task", "weak", Payload::new());
        env.set_strength("task", 1, 0.055);

        let pruned = env.decay("task", &DecayRates::default());
        assert_eq!(pruned, 1);
        assert_eq!(env.trace_count("task"), 1);
        let trace = env.strongest("task", "data").unwrap();
        assert!((trace.strength - 0.85).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_all_committed() {
        let env = std::sync::Arc::new(Environment::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let env = env.clone();
            handles.push(tokio::spawn(async move {
                env.add(&format!("agent{i}"), "task", "data", Payload::new())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(env.read("task", Some("data")).len(), 32);

        env.decay_async("task", &DecayRates::default()).await;
        assert_eq!(env.read("task", None).len(), 32);
    }

    #[test]
    fn test_snapshot_reflects_type_agent_and_bucket() {
        let env = Environment::new();
        env.add_init("a", "task", "x", Payload::new());
        let base = env.snapshot("task");
        assert_eq!(base.len(), 1);
        assert_eq!(base.signatures()[0].strength_bucket, 10);

        // 0.97 still rounds to 1.0
        env.set_strength("task", 0, 0.97);
        assert_eq!(env.snapshot("task"), base);

        env.set_strength("task", 0, 0.8);
        assert_ne!(env.snapshot("task"), base);

        // Same agent and strength, different type
        let other_type = Environment::new();
        other_type.add_init("a", "task", "y", Payload::new());
        assert_ne!(other_type.snapshot("task"), base);

        // Same type and strength, different agent
        let other_agent = Environment::new();
        other_agent.add_init("b", "task", "x", Payload::new());
        assert_ne!(other_agent.snapshot("task"), base);

        let same = Environment::new();
        same.add_init("a", "task", "x", Payload::new());
        assert_eq!(same.snapshot("task"), base);
    }

    #[test]
    fn test_snapshot_equal_across_environments() {
        let left = Environment::new();
        let right = Environment::new();
        for env in [&left, &right] {
            env.add_init("user", "task", "goal", payload(json!({"goal": "x"})));
            env.add_init("a", "task", "analysis", Payload::new());
        }
        // Payload contents do not take part in the fingerprint
        right.add_init("b", "other", "analysis", payload(json!({"ignored": true})));
        assert_eq!(left.snapshot("task"), right.snapshot("task"));
    }

    #[test]
    fn test_errors_query() {
        let env = Environment::new();
        assert!(!env.has_errors("task"));
        env.add_init(
            "coder",
            "task",
            ERROR_TRACE_TYPE,
            payload(json!({"error": "boom", "agent": "coder"})),
        );
        assert!(env.has_errors("task"));
        let errors = env.errors("task");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["error"], json!("boom"));
    }

    #[test]
    fn test_clear_removes_traces_and_fire_records() {
        let env = Environment::new();
        env.add_init("a", "task", "data", Payload::new());
        env.add_init("a", "other", "data", Payload::new());
        env.record_fire("task", "a");
        env.record_fire("other", "a");

        env.clear("task");
        assert_eq!(env.trace_count("task"), 0);
        assert!(!env.has_fired("task", "a"));
        assert!(env.has_fired("other", "a"));
        assert_eq!(env.trace_count("other"), 1);
    }

    #[test]
    fn test_observe_returns_debug_string() {
        let env = Environment::new();
        assert_eq!(env.observe("task"), "(no traces)");

        env.add_init("analyzer", "task", "analysis", payload(json!({"result": "test"})));
        env.add_init("planner", "task", "plan", Payload::new());
        env.invalidate("task", &InvalidateFilter::by_type("plan"));

        let output = env.observe("task");
        assert!(output.contains("analyzer"));
        assert!(output.contains("analysis"));
        assert!(output.contains("str=1.00"));
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('✓'));
        assert!(lines[1].starts_with('✗'));
    }
}
