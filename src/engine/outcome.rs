//! Run outcomes, statuses, and per-step records.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::ConditionError;
use crate::node::NodeError;
use crate::state::State;

/// Lifecycle of one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl ExecutionStatus {
    /// Whether this status marks a finished run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Record of one node execution within a run.
///
/// `attempts` counts every try including the successful one, so a node that
/// failed twice and then succeeded reports `attempts == 3, success == true`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepResult {
    pub node_id: String,
    /// 1-based position of this step within its run.
    pub iteration: u64,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub attempts: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final report of one `execute` call.
///
/// Run-terminal failures (timeout, cancellation, exhausted retries, the
/// iteration cap) land here rather than in `execute`'s `Err`: `status`
/// says how the run ended, `error` carries the terminal error, and `state`
/// plus `steps` preserve everything that happened up to that point.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub run_id: String,
    pub status: ExecutionStatus,
    pub state: State,
    pub steps: Vec<StepResult>,
    pub error: Option<ExecutionError>,
}

impl ExecutionOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, ExecutionStatus::Completed)
    }
}

/// Errors raised by the execution engine.
///
/// `NoStartNode` and `UnknownNode` are pre-flight failures returned as
/// `Err` from `execute`/`execute_parallel`. The remaining variants are
/// run-terminal and travel inside [`ExecutionOutcome::error`].
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutionError {
    #[error("topology has no start node")]
    #[diagnostic(code(stategraph::engine::no_start_node))]
    NoStartNode,

    #[error("unknown node id: {id}")]
    #[diagnostic(
        code(stategraph::engine::unknown_node),
        help("Routing targets and parallel node ids must be registered in the topology.")
    )]
    UnknownNode { id: String },

    /// A node body failed and attempts were exhausted.
    #[error("node {node_id} failed at iteration {iteration} after {attempts} attempt(s)")]
    #[diagnostic(code(stategraph::engine::node_execution))]
    NodeExecution {
        node_id: String,
        iteration: u64,
        attempts: u32,
        #[source]
        source: NodeError,
    },

    /// The iteration cap was hit before the run reached an end node.
    #[error("exceeded max iterations ({limit}) at node {node_id} after {elapsed:?}")]
    #[diagnostic(
        code(stategraph::engine::max_iterations),
        help("Raise max_iterations or break the cycle with a condition that routes to an end node.")
    )]
    MaxIterationsExceeded {
        limit: u64,
        node_id: String,
        elapsed: Duration,
    },

    /// The run's wall-clock budget ran out.
    #[error("run timed out at node {node_id}, iteration {iteration}, after {elapsed:?}")]
    #[diagnostic(code(stategraph::engine::timeout))]
    Timeout {
        node_id: String,
        iteration: u64,
        elapsed: Duration,
    },

    /// The caller cancelled the run.
    #[error("run cancelled at node {node_id}, iteration {iteration}, after {elapsed:?}")]
    #[diagnostic(code(stategraph::engine::cancelled))]
    Cancelled {
        node_id: String,
        iteration: u64,
        elapsed: Duration,
    },

    /// An edge condition returned an error while routing.
    #[error("condition failed routing from node {node_id} at iteration {iteration}")]
    #[diagnostic(code(stategraph::engine::condition_failed))]
    ConditionFailed {
        node_id: String,
        iteration: u64,
        #[source]
        source: ConditionError,
    },

    /// Every node of a parallel batch failed.
    #[error("all parallel nodes failed: {}", .failed.join(", "))]
    #[diagnostic(code(stategraph::engine::all_parallel_failed))]
    AllParallelFailed { failed: Vec<String> },
}
