//! Checkpoint persistence boundary.
//!
//! The engine snapshots its working state after each successful step when
//! checkpointing is enabled. Storage is pluggable through the
//! [`Checkpointer`] trait; this crate ships [`InMemoryCheckpointer`] for
//! tests and development, and external stores implement the same contract.
//!
//! Checkpoint writes are best-effort from the engine's point of view: a
//! failing store is logged and the run continues.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::state::State;

/// Serializable copy of a state's data and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PersistedState {
    pub data: FxHashMap<String, Value>,
    pub metadata: FxHashMap<String, Value>,
}

impl From<&State> for PersistedState {
    fn from(state: &State) -> Self {
        let (data, metadata) = state.to_parts();
        Self { data, metadata }
    }
}

impl PersistedState {
    /// Rebuild a live [`State`] from the persisted maps.
    #[must_use]
    pub fn restore(&self) -> State {
        State::from_parts(self.data.clone(), self.metadata.clone())
    }
}

/// One persisted point in a run: the state after a step, plus enough
/// position information to resume from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    /// Unique id of this checkpoint.
    pub id: String,
    /// Logical grouping key, usually the run id.
    pub thread_id: String,
    pub state: PersistedState,
    /// Node that had just completed when the checkpoint was taken.
    pub node_id: String,
    /// 1-based step number within the run.
    pub step_id: u64,
    #[serde(default)]
    pub metadata: FxHashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Capture the current state after `node_id` completed as step `step_id`.
    #[must_use]
    pub fn capture(
        id: impl Into<String>,
        thread_id: impl Into<String>,
        state: &State,
        node_id: impl Into<String>,
        step_id: u64,
    ) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            state: PersistedState::from(state),
            node_id: node_id.into(),
            step_id,
            metadata: FxHashMap::default(),
            created_at: Utc::now(),
        }
    }

    /// Rebuild a live [`State`] to resume from this checkpoint.
    #[must_use]
    pub fn restore_state(&self) -> State {
        self.state.restore()
    }
}

/// Errors surfaced by checkpoint stores.
#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointerError {
    /// The underlying store rejected or failed the operation.
    #[error("checkpoint storage error: {message}")]
    #[diagnostic(code(stategraph::checkpoint::storage))]
    Storage { message: String },

    /// A checkpoint could not be encoded or decoded.
    #[error(transparent)]
    #[diagnostic(code(stategraph::checkpoint::serde_json))]
    Serialization(#[from] serde_json::Error),
}

/// Pluggable checkpoint storage.
///
/// `thread_id` groups the checkpoints of one run. Implementations must keep
/// `list` ordered oldest-first by `created_at` and make `delete` idempotent.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointerError>;

    async fn load(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<Checkpoint>, CheckpointerError>;

    /// Most recent checkpoint for `thread_id`, if any.
    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointerError>;

    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, CheckpointerError>;

    async fn delete(&self, thread_id: &str, checkpoint_id: &str)
    -> Result<(), CheckpointerError>;
}

/// Volatile checkpoint store backed by a process-local map.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointer {
    store: RwLock<FxHashMap<String, Vec<Checkpoint>>>,
}

impl InMemoryCheckpointer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointerError> {
        let mut store = self.store.write();
        let entries = store.entry(checkpoint.thread_id.clone()).or_default();
        // Re-saving an id overwrites in place.
        if let Some(existing) = entries.iter_mut().find(|c| c.id == checkpoint.id) {
            *existing = checkpoint;
        } else {
            entries.push(checkpoint);
        }
        Ok(())
    }

    async fn load(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<Checkpoint>, CheckpointerError> {
        Ok(self
            .store
            .read()
            .get(thread_id)
            .and_then(|entries| entries.iter().find(|c| c.id == checkpoint_id).cloned()))
    }

    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointerError> {
        Ok(self
            .store
            .read()
            .get(thread_id)
            .and_then(|entries| entries.last().cloned()))
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, CheckpointerError> {
        Ok(self.store.read().get(thread_id).cloned().unwrap_or_default())
    }

    async fn delete(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
    ) -> Result<(), CheckpointerError> {
        if let Some(entries) = self.store.write().get_mut(thread_id) {
            entries.retain(|c| c.id != checkpoint_id);
        }
        Ok(())
    }
}
