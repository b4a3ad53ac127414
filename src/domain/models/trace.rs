//! Trace domain model.
//!
//! A trace is one unit of evidence left by an agent in the shared store.
//! Its identity (agent, task, type, payload, creation time) never changes;
//! only its strength and invalidation flag do, and only through the
//! environment that owns it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload carried by a trace: a JSON object.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Strength at or below which a trace is considered dead.
pub const ALIVE_THRESHOLD: f64 = 0.05;

/// Decay rate applied to trace types without an explicit override.
pub const DEFAULT_DECAY_RATE: f64 = 0.15;

/// Amount added by a reinforcement when the caller does not specify one.
pub const DEFAULT_REINFORCEMENT: f64 = 0.3;

/// Strength of a freshly created trace, and the reinforcement cap.
pub const MAX_STRENGTH: f64 = 1.0;

/// Trace type used to record agent failures.
pub const ERROR_TRACE_TYPE: &str = "error";

/// A decaying, typed record left in the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Unique identifier
    pub id: Uuid,

    /// Name of the agent (or `"user"` for the seed) that left this trace
    pub agent: String,

    /// Task this trace belongs to
    pub task: String,

    /// Trace type tag, e.g. `goal`, `analysis`, `error`
    pub trace_type: String,

    /// Data produced by the agent
    pub payload: Payload,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Current strength, 1.0 at creation
    pub strength: f64,

    /// Once set, never cleared
    pub invalidated: bool,
}

impl Trace {
    /// Create a fresh trace at full strength.
    pub fn new(
        agent: impl Into<String>,
        task: impl Into<String>,
        trace_type: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent: agent.into(),
            task: task.into(),
            trace_type: trace_type.into(),
            payload,
            created_at: Utc::now(),
            strength: MAX_STRENGTH,
            invalidated: false,
        }
    }

    /// Weaken this trace multiplicatively. Returns whether it is still alive.
    pub fn decay(&mut self, rate: f64) -> bool {
        self.strength *= 1.0 - rate;
        self.is_alive()
    }

    /// Mark this trace as unusable. Idempotent.
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// Strengthen this trace, capped at [`MAX_STRENGTH`].
    pub fn reinforce(&mut self, amount: f64) {
        self.strength = (self.strength + amount).min(MAX_STRENGTH);
    }

    /// Strong enough and not invalidated.
    pub fn is_alive(&self) -> bool {
        self.strength > ALIVE_THRESHOLD && !self.invalidated
    }

    /// Time elapsed since creation.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }

    /// Age in fractional seconds.
    pub fn age_secs(&self) -> f64 {
        self.age().num_milliseconds() as f64 / 1000.0
    }

    /// Strength rounded to one decimal, expressed in tenths.
    ///
    /// Rounds the exact binary value rather than `strength * 10`, so a
    /// stored 0.85 (just below the midpoint) lands in bucket 8.
    pub fn strength_bucket(&self) -> i64 {
        format!("{:.1}", self.strength)
            .replace('.', "")
            .parse::<i64>()
            .unwrap_or_default()
    }
}
