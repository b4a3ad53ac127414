//! Port trait definitions (Hexagonal Architecture)
//!
//! - AgentAction: the opaque work an agent performs when it activates
//!
//! Adapters implementing these traits live under `crate::adapters`.

pub mod agent_action;

pub use agent_action::{normalize_outcome, AgentAction, Context};
