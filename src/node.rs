//! Node execution primitives.
//!
//! A workflow step is anything implementing the [`Node`] trait: it receives
//! an execution context plus an isolated copy of the working [`State`],
//! mutates the copy, and hands it back. The engine merges the returned copy
//! into the run's working state only when the body succeeds.
//!
//! # Error Handling
//!
//! Returning `Err(NodeError)` marks the attempt as failed; the engine
//! retries according to the topology's [`ExecutionConfig`](crate::engine::ExecutionConfig)
//! and fails the run once attempts are exhausted.
//!
//! # Examples
//!
//! ```
//! use stategraph::node::{Node, NodeContext, NodeError};
//! use stategraph::state::State;
//! use async_trait::async_trait;
//! use serde_json::json;
//!
//! struct Doubler;
//!
//! #[async_trait]
//! impl Node for Doubler {
//!     async fn run(&self, _ctx: NodeContext, state: State) -> Result<State, NodeError> {
//!         let n = state
//!             .get("n")
//!             .and_then(|v| v.as_i64())
//!             .ok_or(NodeError::MissingInput { what: "n" })?;
//!         state.set("n", json!(n * 2));
//!         Ok(state)
//!     }
//! }
//! ```

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::state::State;

/// Core trait defining executable workflow nodes.
///
/// Implementations should be stateless between runs: the same node instance
/// is shared across concurrent executions of one topology. Long-running
/// bodies should poll [`NodeContext::is_cancelled`] (or select against
/// `ctx.cancellation.cancelled()`) so a cancelled run can wind down early.
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute this node against an isolated copy of the working state.
    async fn run(&self, ctx: NodeContext, state: State) -> Result<State, NodeError>;
}

/// Execution context handed to a node body for one attempt.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Identifier of the run this attempt belongs to.
    pub run_id: String,
    /// Identifier the node was registered under.
    pub node_id: String,
    /// 1-based position of this step within the run.
    pub iteration: u64,
    /// Token cancelled when the caller aborts the run.
    pub cancellation: CancellationToken,
}

impl NodeContext {
    /// Whether the owning run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Errors that fail a node attempt.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the state.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(stategraph::node::missing_input),
        help("Check that an upstream node produced the required key.")
    )]
    MissingInput { what: &'static str },

    /// Input validation failed.
    #[error("validation failed: {0}")]
    #[diagnostic(
        code(stategraph::node::validation),
        help("Check input data format and required fields.")
    )]
    ValidationFailed(String),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(stategraph::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// The body observed cancellation and stopped early.
    #[error("node observed cancellation")]
    #[diagnostic(code(stategraph::node::cancelled))]
    Cancelled,

    /// Any other failure, with a human-readable reason.
    #[error("node failed: {0}")]
    #[diagnostic(code(stategraph::node::failed))]
    Failed(String),
}
