//! Common test utilities for integration tests
//!
//! Shared fixtures for building agents and recording round activity.

#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

use stigmergy::{Agent, AgentSpec, RunOptions};

/// Activation sets per round, as reported by the round observer.
pub type RoundLog = Arc<Mutex<Vec<(u32, Vec<String>)>>>;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Run options that append every round's activation set to `log`.
pub fn recording_options(log: &RoundLog) -> RunOptions {
    let log = Arc::clone(log);
    RunOptions::new().on_round(move |round, active| log.lock().push((round, active.to_vec())))
}

pub fn new_log() -> RoundLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Round in which `agent` first activated.
pub fn first_round_of(log: &RoundLog, agent: &str) -> Option<u32> {
    log.lock()
        .iter()
        .find(|(_, active)| active.iter().any(|a| a == agent))
        .map(|(round, _)| *round)
}

/// Agent whose output names itself and the number of inputs it saw.
pub fn echo_agent<const N: usize>(name: &str, consumes: [&str; N], produces: &str) -> Agent {
    let label = name.to_string();
    Agent::from_fn(AgentSpec::new(name, consumes, produces), move |ctx| {
        let label = label.clone();
        async move { Ok(json!({"by": label, "inputs": ctx.len()})) }
    })
}

/// Agent whose action always fails.
pub fn failing_agent(name: &str, consumes: &[&str], produces: &str) -> Agent {
    Agent::from_fn(
        AgentSpec::new(name, consumes.iter().copied(), produces),
        |_| async { Err::<Value, _>(anyhow::anyhow!("service unavailable")) },
    )
}
