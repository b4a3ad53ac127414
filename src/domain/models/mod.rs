//! Domain models: traces, agent descriptors, configuration and run results.

pub mod agent;
pub mod config;
pub mod run;
pub mod trace;

pub use agent::AgentSpec;
pub use config::{CollectiveConfig, Config, DecayRates, LoggingConfig};
pub use run::{AgentErrorRecord, RunOutcome, RunResult, TraceSummary};
pub use trace::{
    Payload, Trace, ALIVE_THRESHOLD, DEFAULT_DECAY_RATE, DEFAULT_REINFORCEMENT, ERROR_TRACE_TYPE,
    MAX_STRENGTH,
};
