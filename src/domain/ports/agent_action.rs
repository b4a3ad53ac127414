//! Agent action port - the opaque work behind an agent.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::models::Payload;

/// Inputs handed to an action: consumed trace type -> payload of the
/// strongest alive trace of that type.
pub type Context = HashMap<String, Payload>;

/// Capability invoked when an agent activates.
///
/// Implementations may suspend on arbitrary external work (network calls,
/// subprocesses, ...). The returned value becomes the payload of the trace
/// the agent leaves; non-object values are wrapped as `{"result": value}`.
#[async_trait]
pub trait AgentAction: Send + Sync {
    /// Run the action against its context.
    async fn invoke(&self, context: Context) -> anyhow::Result<Value>;
}

/// Normalize an action outcome into a trace payload.
pub fn normalize_outcome(outcome: Value) -> Payload {
    match outcome {
        Value::Object(map) => map,
        other => {
            let mut payload = Payload::new();
            payload.insert("result".to_string(), other);
            payload
        }
    }
}
