//! Closure-backed agent action.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

use crate::domain::ports::{AgentAction, Context};

/// Agent action backed by an async closure `Fn(Context) -> Future`.
pub struct FnAction<F> {
    f: F,
}

impl<F> FnAction<F> {
    /// Wrap a closure.
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> AgentAction for FnAction<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn invoke(&self, context: Context) -> anyhow::Result<Value> {
        (self.f)(context).await
    }
}
