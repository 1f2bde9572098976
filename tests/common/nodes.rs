use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use stategraph::node::{Node, NodeContext, NodeError};
use stategraph::state::State;

/// Sets a fixed key to a fixed value.
pub struct SetValueNode {
    pub key: &'static str,
    pub value: serde_json::Value,
}

impl SetValueNode {
    pub fn new(key: &'static str, value: serde_json::Value) -> Self {
        Self { key, value }
    }
}

#[async_trait]
impl Node for SetValueNode {
    async fn run(&self, _ctx: NodeContext, state: State) -> Result<State, NodeError> {
        state.set(self.key, self.value.clone());
        Ok(state)
    }
}

/// Returns the state unchanged.
pub struct PassthroughNode;

#[async_trait]
impl Node for PassthroughNode {
    async fn run(&self, _ctx: NodeContext, state: State) -> Result<State, NodeError> {
        Ok(state)
    }
}

/// Appends its node id to a `trail` array, for ordering assertions.
pub struct TrailNode;

#[async_trait]
impl Node for TrailNode {
    async fn run(&self, ctx: NodeContext, state: State) -> Result<State, NodeError> {
        let mut trail = state
            .get("trail")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();
        trail.push(json!(ctx.node_id));
        state.set("trail", json!(trail));
        Ok(state)
    }
}

/// Always fails with the given message.
pub struct FailingNode {
    pub message: &'static str,
}

#[async_trait]
impl Node for FailingNode {
    async fn run(&self, _ctx: NodeContext, _state: State) -> Result<State, NodeError> {
        Err(NodeError::Failed(self.message.to_string()))
    }
}

/// Fails a fixed number of times, then succeeds and marks the state.
pub struct FlakyNode {
    pub failures: u32,
    seen: AtomicU32,
}

impl FlakyNode {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            seen: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Node for FlakyNode {
    async fn run(&self, _ctx: NodeContext, state: State) -> Result<State, NodeError> {
        let attempt = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            return Err(NodeError::Failed(format!("transient failure #{attempt}")));
        }
        state.set("flaky_done", json!(true));
        Ok(state)
    }
}

/// Sleeps before succeeding, for timeout and cancellation tests.
pub struct SlowNode {
    pub delay: Duration,
}

#[async_trait]
impl Node for SlowNode {
    async fn run(&self, _ctx: NodeContext, state: State) -> Result<State, NodeError> {
        tokio::time::sleep(self.delay).await;
        state.set("slow_done", json!(true));
        Ok(state)
    }
}

/// Increments a numeric `count` key on every execution.
pub struct CountingNode;

#[async_trait]
impl Node for CountingNode {
    async fn run(&self, _ctx: NodeContext, state: State) -> Result<State, NodeError> {
        let count = state.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
        state.set("count", json!(count + 1));
        Ok(state)
    }
}
