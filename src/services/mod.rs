//! Services - the environment, agents and the round driver built on the
//! domain models.

pub mod agent;
pub mod collective;
pub mod environment;

pub use agent::Agent;
pub use collective::{Collective, RoundObserver, RunOptions, DEFAULT_GOAL_TYPE, SEED_AGENT};
pub use environment::{Environment, Fingerprint, InvalidateFilter, TraceSignature};
