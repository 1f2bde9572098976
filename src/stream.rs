//! Live step streaming.
//!
//! When streaming is enabled in the topology's
//! [`ExecutionConfig`](crate::engine::ExecutionConfig), the engine publishes
//! each [`StepResult`] to every attached [`StepStream`] as soon as the step
//! finishes. Buffers are bounded: a subscriber that stops draining
//! eventually makes the engine await between steps instead of dropping
//! results. Consume eagerly (or from a separate task) to keep a run moving.
//!
//! ```no_run
//! # use stategraph::engine::Engine;
//! # async fn demo(engine: &Engine) {
//! let stream = engine.stream();
//! tokio::spawn(async move {
//!     while let Some(step) = stream.recv().await {
//!         println!("{} ok={}", step.node_id, step.success);
//!     }
//! });
//! # }
//! ```

use futures_util::Stream;
use parking_lot::Mutex;
use std::time::Duration;

use crate::engine::StepResult;

/// Fan-out side of step streaming, owned by the engine.
#[derive(Debug, Default)]
pub(crate) struct StepPublisher {
    senders: Mutex<Vec<flume::Sender<StepResult>>>,
}

impl StepPublisher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Attach a new subscriber with the given buffer capacity.
    pub(crate) fn subscribe(&self, capacity: usize) -> StepStream {
        let (tx, rx) = flume::bounded(capacity.max(1));
        self.senders.lock().push(tx);
        StepStream { receiver: rx }
    }

    /// Deliver `step` to every live subscriber, awaiting on full buffers.
    /// Subscribers that dropped their stream are pruned afterwards.
    pub(crate) async fn publish(&self, step: &StepResult) {
        // Snapshot the senders so the lock is not held across await points.
        let senders: Vec<flume::Sender<StepResult>> = self.senders.lock().clone();
        if senders.is_empty() {
            return;
        }
        let mut disconnected = false;
        for sender in &senders {
            if sender.send_async(step.clone()).await.is_err() {
                disconnected = true;
            }
        }
        if disconnected {
            self.senders.lock().retain(|s| !s.is_disconnected());
        }
    }
}

/// Receiving end of step streaming.
///
/// Steps arrive in execution order for the runs that published them. The
/// stream stays open across multiple `execute` calls on the same engine;
/// it ends only when the engine is dropped.
#[derive(Debug, Clone)]
pub struct StepStream {
    receiver: flume::Receiver<StepResult>,
}

impl StepStream {
    /// Await the next step. Returns `None` once the engine is gone and the
    /// buffer is drained.
    pub async fn recv(&self) -> Option<StepResult> {
        self.receiver.recv_async().await.ok()
    }

    /// Non-blocking poll for a buffered step.
    #[must_use]
    pub fn try_recv(&self) -> Option<StepResult> {
        self.receiver.try_recv().ok()
    }

    /// Await the next step, giving up after `timeout`.
    pub async fn next_timeout(&self, timeout: Duration) -> Option<StepResult> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }

    /// Number of steps currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Drain everything currently buffered without waiting.
    #[must_use]
    pub fn drain(&self) -> Vec<StepResult> {
        self.receiver.try_iter().collect()
    }

    /// Convert into an async [`Stream`] of steps.
    pub fn into_stream(self) -> impl Stream<Item = StepResult> {
        self.receiver.into_stream()
    }
}
