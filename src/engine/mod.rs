//! Workflow execution engine.
//!
//! [`Engine`] drives a [`Topology`](crate::graph::Topology) from its start
//! node to completion: one node at a time along the first viable edge, with
//! per-node retries, a run-wide deadline, cooperative cancellation, and an
//! iteration cap guarding cycles. [`Engine::execute_parallel`] runs a set
//! of independent nodes concurrently against isolated state clones.
//!
//! Run-terminal failures are reported through [`ExecutionOutcome`] rather
//! than `Err`, so callers always keep the final state and the
//! [`StepResult`] history of how the run got there.

mod config;
mod executor;
mod outcome;
mod parallel;

pub use config::{DEFAULT_STREAM_BUFFER, ExecutionConfig};
pub use executor::Engine;
pub use outcome::{ExecutionError, ExecutionOutcome, ExecutionStatus, StepResult};
pub use parallel::ParallelReport;
