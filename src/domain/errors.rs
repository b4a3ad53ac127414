//! Domain errors for the stigmergy collective.

use thiserror::Error;

/// Domain-level errors that can occur while driving a collective.
///
/// Agent failures (`ActionFailed`, `AgentTimedOut`, `AgentPanicked`) are
/// contained by the round loop and recorded on the run result; every other
/// variant aborts the run it occurs in.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Task id was empty or blank
    #[error("Invalid task id: {0:?}")]
    InvalidTaskId(String),

    /// Agent descriptor failed validation
    #[error("Invalid agent {name:?}: {reason}")]
    InvalidAgent {
        /// Offending agent name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// An agent with this name is already registered
    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    /// Round budget below one
    #[error("Invalid round budget: {0}. Must be at least 1")]
    InvalidRoundBudget(u32),

    /// Negative or NaN reinforcement amount
    #[error("Invalid reinforcement amount: {0}. Must be non-negative")]
    InvalidReinforcement(f64),

    /// The agent's action returned an error
    #[error("Agent {agent} failed: {message}")]
    ActionFailed {
        /// Failing agent
        agent: String,
        /// Error chain of the action
        message: String,
    },

    /// The agent's action exceeded the configured timeout
    #[error("Agent {agent} timed out after {timeout_ms}ms")]
    AgentTimedOut {
        /// Slow agent
        agent: String,
        /// Timeout that was exceeded
        timeout_ms: u64,
    },

    /// The agent's action panicked
    #[error("Agent {agent} panicked: {message}")]
    AgentPanicked {
        /// Panicking agent
        agent: String,
        /// Panic message, when it was a string
        message: String,
    },

    /// Configuration or definition failed validation
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_failure_messages() {
        let failed = DomainError::ActionFailed {
            agent: "coder".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(failed.to_string(), "Agent coder failed: boom");

        let timed_out = DomainError::AgentTimedOut {
            agent: "coder".to_string(),
            timeout_ms: 50,
        };
        assert_eq!(timed_out.to_string(), "Agent coder timed out after 50ms");

        assert_eq!(
            DomainError::InvalidRoundBudget(0).to_string(),
            "Invalid round budget: 0. Must be at least 1"
        );
    }
}
