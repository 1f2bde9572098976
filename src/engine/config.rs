//! Execution settings attached to a topology.

use std::time::Duration;

/// Default step-stream subscriber buffer capacity.
pub const DEFAULT_STREAM_BUFFER: usize = 1024;

/// Per-topology execution settings.
///
/// Attached at build time via
/// [`TopologyBuilder::with_config`](crate::graph::TopologyBuilder::with_config)
/// and applied to every run over that topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Maximum number of node executions in one run. Exceeding it fails the
    /// run; this is the cycle guard.
    pub max_iterations: u64,
    /// Wall-clock budget for the whole run, `None` for unbounded.
    pub timeout: Option<Duration>,
    /// Publish a [`StepResult`](crate::engine::StepResult) to attached
    /// streams after every step.
    pub enable_streaming: bool,
    /// Persist a checkpoint after every successful step (requires a
    /// checkpointer on the engine).
    pub enable_checkpoints: bool,
    /// Marks the topology's independent branches as intended for concurrent
    /// execution. `execute` always steps sequentially; hosts that honor this
    /// flag batch the independent node ids through
    /// [`Engine::execute_parallel`](crate::engine::Engine::execute_parallel)
    /// instead.
    pub parallel_execution: bool,
    /// Total attempts per node execution, including the first. `1` means no
    /// retry.
    pub retry_attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Buffer capacity handed to each new step-stream subscriber.
    pub stream_buffer: usize,
    /// Override for the checkpoint grouping key; defaults to the run id.
    pub thread_id: Option<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            timeout: None,
            enable_streaming: false,
            enable_checkpoints: false,
            parallel_execution: false,
            retry_attempts: 1,
            retry_delay: Duration::from_millis(100),
            stream_buffer: DEFAULT_STREAM_BUFFER,
            thread_id: None,
        }
    }
}

impl ExecutionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.enable_streaming = enabled;
        self
    }

    #[must_use]
    pub fn with_checkpoints(mut self, enabled: bool) -> Self {
        self.enable_checkpoints = enabled;
        self
    }

    #[must_use]
    pub fn with_parallel_execution(mut self, enabled: bool) -> Self {
        self.parallel_execution = enabled;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity;
        self
    }

    #[must_use]
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }
}
