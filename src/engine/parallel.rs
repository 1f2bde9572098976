//! Concurrent execution of independent nodes.

use futures_util::future::join_all;
use rustc_hash::FxHashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::engine::executor::{Engine, NodeRun, RunGuard};
use crate::engine::outcome::{ExecutionError, StepResult};
use crate::state::State;

/// Per-node results of one `execute_parallel` call.
///
/// Successful nodes leave their un-merged output states in `outputs`; the
/// engine never merges them automatically because there is no general
/// policy for overlapping writes. Callers that keep parallel key-sets
/// disjoint can fold `outputs` into their working state in any order;
/// otherwise the merge order decides conflicts (last write wins).
#[derive(Debug, Default)]
pub struct ParallelReport {
    /// Step record per node, failed ones included.
    pub results: FxHashMap<String, StepResult>,
    /// Output state per successful node.
    pub outputs: FxHashMap<String, State>,
    /// Ids of the nodes that failed, in the caller's input order.
    pub failed: Vec<String>,
}

impl ParallelReport {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Engine {
    /// Run the named nodes concurrently, each against an independent deep
    /// clone of `state`.
    ///
    /// A failing node never cancels its siblings; its failure is recorded
    /// and the rest run to completion. `Err` is returned only when an id is
    /// unknown, when the shared cancellation token or run deadline
    /// interrupts the batch, or when every node fails
    /// ([`ExecutionError::AllParallelFailed`]). Partial failure is an `Ok`
    /// report with a non-empty `failed` list.
    #[instrument(skip(self, cancel, state), fields(topology = %self.topology().id, nodes = node_ids.len()), err)]
    pub async fn execute_parallel(
        &self,
        cancel: CancellationToken,
        node_ids: &[String],
        state: &State,
    ) -> Result<ParallelReport, ExecutionError> {
        let mut entries = Vec::with_capacity(node_ids.len());
        for id in node_ids {
            let entry = self
                .topology()
                .node(id)
                .ok_or_else(|| ExecutionError::UnknownNode { id: id.clone() })?;
            entries.push(entry);
        }
        if entries.is_empty() {
            return Ok(ParallelReport::default());
        }

        let config = self.topology().config().clone();
        let run_id = self.ids.run_id();
        let deadline = config.timeout.map(|t| Instant::now() + t);
        let run_started = std::time::Instant::now();
        let _guard = RunGuard::enter(self);
        tracing::info!(run = %run_id, nodes = entries.len(), "parallel batch started");

        let tasks = entries.iter().map(|&entry| {
            let cancel = cancel.clone();
            let run_id = run_id.clone();
            async move {
                let run = self
                    .run_node_with_retry(&cancel, deadline, run_started, &run_id, entry, 1, state)
                    .await;
                (entry.id.clone(), run)
            }
        });
        let completed = join_all(tasks).await;

        let mut report = ParallelReport::default();
        let mut interrupted: Option<ExecutionError> = None;
        for (id, run) in completed {
            match run {
                NodeRun::Success { step, state: output } => {
                    self.record_step(&config, &step).await;
                    report.results.insert(id.clone(), step);
                    report.outputs.insert(id, output);
                }
                NodeRun::Failure { step, error } => {
                    tracing::warn!(run = %run_id, node = %id, error = %error, "parallel node failed");
                    self.record_step(&config, &step).await;
                    report.results.insert(id.clone(), step);
                    report.failed.push(id);
                }
                NodeRun::Interrupted { error } => {
                    if interrupted.is_none() {
                        interrupted = Some(error);
                    }
                }
            }
        }

        if let Some(error) = interrupted {
            return Err(error);
        }
        if report.failed.len() == node_ids.len() {
            return Err(ExecutionError::AllParallelFailed {
                failed: report.failed,
            });
        }
        Ok(report)
    }
}
