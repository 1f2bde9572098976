//! Sequential workflow execution.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::checkpoint::{Checkpoint, Checkpointer};
use crate::engine::config::ExecutionConfig;
use crate::engine::outcome::{ExecutionError, ExecutionOutcome, ExecutionStatus, StepResult};
use crate::graph::{ConditionError, NodeEntry, Topology};
use crate::node::NodeContext;
use crate::state::State;
use crate::stream::{StepPublisher, StepStream};
use crate::utils::IdGenerator;

/// Result of driving one node through its retry loop.
pub(crate) enum NodeRun {
    /// The body returned a state; `step` records the attempt count.
    Success { step: StepResult, state: State },
    /// Attempts are exhausted; the step is recorded as failed.
    Failure {
        step: StepResult,
        error: ExecutionError,
    },
    /// Cancellation or the run deadline interrupted the attempt. The step
    /// never finished, so nothing is recorded in the history.
    Interrupted { error: ExecutionError },
}

/// Executes workflow runs over a shared [`Topology`].
///
/// One engine can serve any number of concurrent and sequential `execute`
/// calls; each run works on its own [`State`] lineage cloned from the
/// caller's initial state. The engine also carries the cross-run
/// introspection surface: cumulative step history, the most recent working
/// state, and step streaming.
///
/// # Examples
///
/// ```no_run
/// use stategraph::engine::Engine;
/// use stategraph::state::State;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn demo(topology: stategraph::graph::Topology) -> miette::Result<()> {
/// let engine = Engine::new(Arc::new(topology));
/// let outcome = engine
///     .execute(CancellationToken::new(), &State::new())
///     .await?;
/// println!("{}: {} steps", outcome.status, outcome.steps.len());
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    topology: Arc<Topology>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    pub(crate) publisher: StepPublisher,
    pub(crate) history: Mutex<Vec<StepResult>>,
    current: RwLock<Option<State>>,
    pub(crate) active: AtomicUsize,
    pub(crate) ids: IdGenerator,
}

impl Engine {
    #[must_use]
    pub fn new(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            checkpointer: None,
            publisher: StepPublisher::new(),
            history: Mutex::new(Vec::new()),
            current: RwLock::new(None),
            active: AtomicUsize::new(0),
            ids: IdGenerator::new(),
        }
    }

    /// Attach a checkpoint store. Checkpoints are written only when the
    /// topology's config also enables them.
    #[must_use]
    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// The topology this engine executes.
    #[must_use]
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// Attach a step-stream subscriber. Steps published after this call are
    /// delivered in execution order; the buffer capacity comes from the
    /// topology's config.
    #[must_use]
    pub fn stream(&self) -> StepStream {
        self.publisher.subscribe(self.topology.config().stream_buffer)
    }

    /// Cumulative step records across all runs since the last
    /// [`clear_history`](Self::clear_history).
    #[must_use]
    pub fn execution_history(&self) -> Vec<StepResult> {
        self.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    /// Deep copy of the working state of the most recent run (in-flight or
    /// finished). `None` before the first run.
    #[must_use]
    pub fn current_state(&self) -> Option<State> {
        self.current.read().clone()
    }

    /// Whether any run is currently in flight on this engine.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    /// Execute the topology from its start node until an end node, a dead
    /// end, or a terminal failure.
    ///
    /// Returns `Err` only for pre-flight validation problems. Everything
    /// that happens once the run is underway, including timeouts,
    /// cancellation, and exhausted retries, is reported through the
    /// returned [`ExecutionOutcome`] so the final state and step history
    /// survive.
    #[instrument(skip(self, cancel, initial), fields(topology = %self.topology.id), err)]
    pub async fn execute(
        &self,
        cancel: CancellationToken,
        initial: &State,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let config = self.topology.config().clone();
        let start = self.topology.start_node().to_string();
        if start.is_empty() {
            return Err(ExecutionError::NoStartNode);
        }
        if !self.topology.contains_node(&start) {
            return Err(ExecutionError::UnknownNode { id: start });
        }

        let run_id = self.ids.run_id();
        let thread_id = config.thread_id.clone().unwrap_or_else(|| run_id.clone());
        let deadline = config.timeout.map(|t| Instant::now() + t);
        let run_started = std::time::Instant::now();

        let state = initial.clone();
        let mut steps: Vec<StepResult> = Vec::new();
        let mut current = start;
        let mut iteration: u64 = 0;

        let _guard = RunGuard::enter(self);
        *self.current.write() = Some(state.clone());
        tracing::info!(run = %run_id, start = %current, "run started");

        loop {
            if cancel.is_cancelled() {
                let error = ExecutionError::Cancelled {
                    node_id: current,
                    iteration,
                    elapsed: run_started.elapsed(),
                };
                return Ok(self.finish(run_id, ExecutionStatus::Cancelled, state, steps, error));
            }
            if let Some(d) = deadline
                && Instant::now() >= d
            {
                let error = ExecutionError::Timeout {
                    node_id: current,
                    iteration,
                    elapsed: run_started.elapsed(),
                };
                return Ok(self.finish(run_id, ExecutionStatus::TimedOut, state, steps, error));
            }
            if iteration >= config.max_iterations {
                let error = ExecutionError::MaxIterationsExceeded {
                    limit: config.max_iterations,
                    node_id: current,
                    elapsed: run_started.elapsed(),
                };
                return Ok(self.finish(run_id, ExecutionStatus::Failed, state, steps, error));
            }
            iteration += 1;

            let Some(entry) = self.topology.node(&current) else {
                let error = ExecutionError::UnknownNode { id: current };
                return Ok(self.finish(run_id, ExecutionStatus::Failed, state, steps, error));
            };

            match self
                .run_node_with_retry(&cancel, deadline, run_started, &run_id, entry, iteration, &state)
                .await
            {
                NodeRun::Success { step, state: output } => {
                    self.record_step(&config, &step).await;
                    steps.push(step);
                    state.merge(&output);
                    *self.current.write() = Some(state.clone());
                }
                NodeRun::Failure { step, error } => {
                    self.record_step(&config, &step).await;
                    steps.push(step);
                    return Ok(self.finish(run_id, ExecutionStatus::Failed, state, steps, error));
                }
                NodeRun::Interrupted { error } => {
                    let status = match &error {
                        ExecutionError::Timeout { .. } => ExecutionStatus::TimedOut,
                        _ => ExecutionStatus::Cancelled,
                    };
                    return Ok(self.finish(run_id, status, state, steps, error));
                }
            }

            self.maybe_checkpoint(&config, &thread_id, &state, &current, iteration)
                .await;

            if self.topology.is_end_node(&current) {
                tracing::info!(run = %run_id, node = %current, iteration, "run completed at end node");
                return Ok(self.complete(run_id, state, steps));
            }

            match self.next_node(&current, &state) {
                Ok(Some(next)) => {
                    if !self.topology.contains_node(&next) {
                        let error = ExecutionError::UnknownNode { id: next };
                        return Ok(self.finish(
                            run_id,
                            ExecutionStatus::Failed,
                            state,
                            steps,
                            error,
                        ));
                    }
                    tracing::debug!(run = %run_id, from = %current, to = %next, iteration, "routing");
                    current = next;
                }
                Ok(None) => {
                    tracing::info!(run = %run_id, node = %current, iteration, "run completed at dead end");
                    return Ok(self.complete(run_id, state, steps));
                }
                Err(source) => {
                    let error = ExecutionError::ConditionFailed {
                        node_id: current,
                        iteration,
                        source,
                    };
                    return Ok(self.finish(run_id, ExecutionStatus::Failed, state, steps, error));
                }
            }
        }
    }

    /// Drive one node through its attempt/retry loop against a clone of
    /// `base_state`. Cancellation and the run deadline interrupt both the
    /// body and the pause between attempts; interruption errors report
    /// `elapsed` from `run_started`, matching the pre-step guards.
    pub(crate) async fn run_node_with_retry(
        &self,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
        run_started: std::time::Instant,
        run_id: &str,
        entry: &NodeEntry,
        iteration: u64,
        base_state: &State,
    ) -> NodeRun {
        let config = self.topology.config();
        let max_attempts = config.retry_attempts.max(1);
        let started_at = chrono::Utc::now();
        let attempt_started = std::time::Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let ctx = NodeContext {
                run_id: run_id.to_string(),
                node_id: entry.id.clone(),
                iteration,
                cancellation: cancel.clone(),
            };
            let body = entry.node.run(ctx, base_state.clone());
            tokio::pin!(body);

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return NodeRun::Interrupted {
                        error: ExecutionError::Cancelled {
                            node_id: entry.id.clone(),
                            iteration,
                            elapsed: run_started.elapsed(),
                        },
                    };
                }
                () = until_deadline(deadline) => {
                    return NodeRun::Interrupted {
                        error: ExecutionError::Timeout {
                            node_id: entry.id.clone(),
                            iteration,
                            elapsed: run_started.elapsed(),
                        },
                    };
                }
                result = &mut body => result,
            };

            match result {
                Ok(output) => {
                    return NodeRun::Success {
                        step: StepResult {
                            node_id: entry.id.clone(),
                            iteration,
                            started_at,
                            duration: attempt_started.elapsed(),
                            attempts,
                            success: true,
                            error: None,
                        },
                        state: output,
                    };
                }
                Err(node_error) => {
                    if attempts >= max_attempts {
                        let error = ExecutionError::NodeExecution {
                            node_id: entry.id.clone(),
                            iteration,
                            attempts,
                            source: node_error,
                        };
                        return NodeRun::Failure {
                            step: StepResult {
                                node_id: entry.id.clone(),
                                iteration,
                                started_at,
                                duration: attempt_started.elapsed(),
                                attempts,
                                success: false,
                                error: Some(error.to_string()),
                            },
                            error,
                        };
                    }
                    tracing::warn!(
                        node = %entry.id,
                        iteration,
                        attempt = attempts,
                        error = %node_error,
                        "node attempt failed; retrying"
                    );
                    let pause = sleep(config.retry_delay);
                    tokio::pin!(pause);
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            return NodeRun::Interrupted {
                                error: ExecutionError::Cancelled {
                                    node_id: entry.id.clone(),
                                    iteration,
                                    elapsed: run_started.elapsed(),
                                },
                            };
                        }
                        () = until_deadline(deadline) => {
                            return NodeRun::Interrupted {
                                error: ExecutionError::Timeout {
                                    node_id: entry.id.clone(),
                                    iteration,
                                    elapsed: run_started.elapsed(),
                                },
                            };
                        }
                        () = &mut pause => {}
                    }
                }
            }
        }
    }

    /// Publish (when streaming is on) and append one step to the
    /// cumulative history.
    pub(crate) async fn record_step(&self, config: &ExecutionConfig, step: &StepResult) {
        if config.enable_streaming {
            self.publisher.publish(step).await;
        }
        self.history.lock().push(step.clone());
    }

    /// First viable outgoing edge of `from`, in declaration order.
    fn next_node(&self, from: &str, state: &State) -> Result<Option<String>, ConditionError> {
        for edge in self.topology.edges_from(from) {
            if let Some(target) = edge.evaluate(state)? {
                return Ok(Some(target));
            }
        }
        Ok(None)
    }

    /// Save a checkpoint when configured to. Failures are logged and never
    /// abort the run.
    async fn maybe_checkpoint(
        &self,
        config: &ExecutionConfig,
        thread_id: &str,
        state: &State,
        node_id: &str,
        step_id: u64,
    ) {
        if !config.enable_checkpoints {
            return;
        }
        let Some(checkpointer) = &self.checkpointer else {
            return;
        };
        let checkpoint =
            Checkpoint::capture(self.ids.checkpoint_id(), thread_id, state, node_id, step_id);
        if let Err(error) = checkpointer.save(checkpoint).await {
            tracing::warn!(
                thread = %thread_id,
                node = %node_id,
                step = step_id,
                error = %error,
                "checkpoint save failed; continuing"
            );
        }
    }

    fn complete(
        &self,
        run_id: String,
        state: State,
        steps: Vec<StepResult>,
    ) -> ExecutionOutcome {
        *self.current.write() = Some(state.clone());
        ExecutionOutcome {
            run_id,
            status: ExecutionStatus::Completed,
            state,
            steps,
            error: None,
        }
    }

    fn finish(
        &self,
        run_id: String,
        status: ExecutionStatus,
        state: State,
        steps: Vec<StepResult>,
        error: ExecutionError,
    ) -> ExecutionOutcome {
        *self.current.write() = Some(state.clone());
        tracing::warn!(run = %run_id, status = %status, error = %error, "run ended");
        ExecutionOutcome {
            run_id,
            status,
            state,
            steps,
            error: Some(error),
        }
    }
}

/// Tracks in-flight runs for [`Engine::is_running`].
pub(crate) struct RunGuard<'a> {
    engine: &'a Engine,
}

impl<'a> RunGuard<'a> {
    pub(crate) fn enter(engine: &'a Engine) -> Self {
        engine.active.fetch_add(1, Ordering::SeqCst);
        Self { engine }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.engine.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sleeps until the run deadline, or forever when there is none.
pub(crate) async fn until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(d) => sleep_until(d).await,
        None => std::future::pending().await,
    }
}
