//! # Stategraph: Graph-driven Workflow Execution
//!
//! Stategraph executes computational workflows expressed as directed
//! graphs: nodes are async units of work, edges encode control flow, and a
//! shared [`State`](state::State) container carries data between steps.
//!
//! ## Core Concepts
//!
//! - **Nodes**: Async units of work implementing [`Node`](node::Node)
//! - **Topology**: Declarative graph definition with conditional edges
//! - **State**: Concurrent key/value container with snapshots and merge
//! - **Engine**: Sequential and parallel execution with retries, timeouts,
//!   cancellation, and a cycle guard
//! - **Streaming**: Live, bounded per-step progress feeds
//! - **Checkpointing**: Pluggable persistence of state between steps
//!
//! ## Quick Start
//!
//! ```
//! use stategraph::engine::Engine;
//! use stategraph::graph::TopologyBuilder;
//! use stategraph::node::{Node, NodeContext, NodeError};
//! use stategraph::state::State;
//! use async_trait::async_trait;
//! use serde_json::json;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Greet;
//!
//! #[async_trait]
//! impl Node for Greet {
//!     async fn run(&self, _ctx: NodeContext, state: State) -> Result<State, NodeError> {
//!         state.set("greeting", json!("hello"));
//!         Ok(state)
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> miette::Result<()> {
//! let topology = TopologyBuilder::new("demo", "demo workflow")
//!     .add_node("greet", "greeting step", Greet)?
//!     .with_start_node("greet")?
//!     .add_end_node("greet")?
//!     .build()?;
//!
//! let engine = Engine::new(Arc::new(topology));
//! let outcome = engine
//!     .execute(CancellationToken::new(), &State::new())
//!     .await?;
//!
//! assert!(outcome.is_success());
//! assert_eq!(outcome.state.get("greeting"), Some(json!("hello")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Routing
//!
//! Outgoing edges are evaluated in declaration order and the first viable
//! one is taken, which keeps branching deterministic. Conditional edges
//! decide viability (and the actual target) at runtime against the working
//! state; a run completes when it executes an end node or reaches a node
//! with no viable edge.
//!
//! ## Module Guide
//!
//! - [`state`] - Shared state container, snapshots, and merging
//! - [`node`] - Node trait and execution context
//! - [`graph`] - Topology definition and validation
//! - [`engine`] - Sequential and parallel execution
//! - [`stream`] - Live step streaming
//! - [`checkpoint`] - Checkpoint persistence boundary
//! - [`telemetry`] - Tracing subscriber setup for hosts

pub mod checkpoint;
pub mod engine;
pub mod graph;
pub mod node;
pub mod state;
pub mod stream;
pub mod telemetry;
pub mod utils;

pub use checkpoint::{Checkpoint, Checkpointer, CheckpointerError, InMemoryCheckpointer};
pub use engine::{
    Engine, ExecutionConfig, ExecutionError, ExecutionOutcome, ExecutionStatus, ParallelReport,
    StepResult,
};
pub use graph::{ConditionError, EdgeCondition, Topology, TopologyBuilder, TopologyError};
pub use node::{Node, NodeContext, NodeError};
pub use state::{Snapshot, State, StateError};
pub use stream::StepStream;
