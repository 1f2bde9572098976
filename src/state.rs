//! Shared state container for workflow execution.
//!
//! [`State`] is the data that flows through a workflow: a dynamically typed
//! key/value map, a parallel metadata namespace, and a history of named
//! [`Snapshot`]s that can be restored later. A `State` handle is safe to
//! read from many tasks concurrently; writes take the internal lock
//! exclusively.
//!
//! Cloning a `State` produces a fully independent deep copy (the snapshot
//! history does not travel with the clone). This is what the execution
//! engine hands to node bodies, so a failing node never corrupts the
//! working state.
//!
//! # Examples
//!
//! ```
//! use stategraph::state::State;
//! use serde_json::json;
//!
//! let state = State::new();
//! state.set("counter", json!(1));
//! state.set_metadata("source", json!("ingest"));
//!
//! let snapshot = state.create_snapshot("before-update");
//! state.set("counter", json!(2));
//!
//! state.restore_snapshot("before-update").unwrap();
//! assert_eq!(state.get("counter"), Some(json!(1)));
//! assert_eq!(snapshot.data.get("counter"), Some(&json!(1)));
//! ```

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by [`State`] operations.
#[derive(Debug, Error, Diagnostic)]
pub enum StateError {
    /// No snapshot with the requested name exists in the history.
    #[error("snapshot not found: {name}")]
    #[diagnostic(
        code(stategraph::state::snapshot_not_found),
        help("Create the snapshot with `create_snapshot` before restoring it.")
    )]
    SnapshotNotFound { name: String },
}

/// Immutable point-in-time copy of a state's data and metadata.
///
/// Snapshots are produced by [`State::create_snapshot`] and kept in the
/// owning state's history until restored or dropped with the state. They
/// serialize cleanly, so callers can persist them alongside checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub data: FxHashMap<String, Value>,
    pub metadata: FxHashMap<String, Value>,
}

#[derive(Debug, Default)]
struct StateInner {
    data: FxHashMap<String, Value>,
    metadata: FxHashMap<String, Value>,
    history: Vec<Snapshot>,
}

/// Concurrent key/value state shared across a workflow run.
///
/// All accessors return owned copies of the stored [`Value`]s, so no lock
/// is held while a caller inspects results.
#[derive(Debug, Default)]
pub struct State {
    inner: Arc<RwLock<StateInner>>,
}

impl State {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a state with initial data and metadata.
    #[must_use]
    pub fn builder() -> StateBuilder {
        StateBuilder::default()
    }

    /// Fetch a copy of the value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().data.get(key).cloned()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.write().data.insert(key.into(), value);
    }

    /// Remove `key` from the data map. Returns `true` if it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.write().data.remove(key).is_some()
    }

    /// All data keys currently present.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().data.keys().cloned().collect()
    }

    /// Number of entries in the data map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Copy of the full data map.
    #[must_use]
    pub fn data(&self) -> FxHashMap<String, Value> {
        self.inner.read().data.clone()
    }

    /// Fetch a copy of the metadata value stored under `key`, if any.
    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<Value> {
        self.inner.read().metadata.get(key).cloned()
    }

    /// Store a metadata entry. Metadata lives in its own namespace and never
    /// collides with data keys.
    pub fn set_metadata(&self, key: impl Into<String>, value: Value) {
        self.inner.write().metadata.insert(key.into(), value);
    }

    /// Copy of the full metadata map.
    #[must_use]
    pub fn metadata(&self) -> FxHashMap<String, Value> {
        self.inner.read().metadata.clone()
    }

    /// Merge another state into this one. Keys from `other` win on
    /// conflict, for both data and metadata. `other` is left untouched and
    /// its snapshot history is ignored.
    pub fn merge(&self, other: &State) {
        let (other_data, other_metadata) = {
            let guard = other.inner.read();
            (guard.data.clone(), guard.metadata.clone())
        };
        let mut guard = self.inner.write();
        guard.data.extend(other_data);
        guard.metadata.extend(other_metadata);
    }

    /// Record a named snapshot of the current data and metadata.
    ///
    /// The snapshot is appended to this state's history and also returned
    /// to the caller. Creating a second snapshot under the same name shadows
    /// the first for [`restore_snapshot`](Self::restore_snapshot), which
    /// matches the most recent entry.
    pub fn create_snapshot(&self, name: impl Into<String>) -> Snapshot {
        let name = name.into();
        let mut guard = self.inner.write();
        let snapshot = Snapshot {
            name,
            created_at: Utc::now(),
            data: guard.data.clone(),
            metadata: guard.metadata.clone(),
        };
        guard.history.push(snapshot.clone());
        snapshot
    }

    /// Replace the current data and metadata with the most recent snapshot
    /// recorded under `name`. The history itself is preserved, so a
    /// snapshot can be restored repeatedly.
    pub fn restore_snapshot(&self, name: &str) -> Result<(), StateError> {
        let mut guard = self.inner.write();
        let snapshot = guard
            .history
            .iter()
            .rev()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| StateError::SnapshotNotFound {
                name: name.to_string(),
            })?;
        guard.data = snapshot.data;
        guard.metadata = snapshot.metadata;
        Ok(())
    }

    /// Copies of all recorded snapshots, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Snapshot> {
        self.inner.read().history.clone()
    }

    /// Raw parts for persistence: `(data, metadata)`.
    #[must_use]
    pub fn to_parts(&self) -> (FxHashMap<String, Value>, FxHashMap<String, Value>) {
        let guard = self.inner.read();
        (guard.data.clone(), guard.metadata.clone())
    }

    /// Rebuild a state from persisted parts. The history starts empty.
    #[must_use]
    pub fn from_parts(
        data: FxHashMap<String, Value>,
        metadata: FxHashMap<String, Value>,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StateInner {
                data,
                metadata,
                history: Vec::new(),
            })),
        }
    }
}

impl Clone for State {
    /// Deep copy of data and metadata. The clone starts with an empty
    /// snapshot history of its own.
    fn clone(&self) -> Self {
        let guard = self.inner.read();
        Self {
            inner: Arc::new(RwLock::new(StateInner {
                data: guard.data.clone(),
                metadata: guard.metadata.clone(),
                history: Vec::new(),
            })),
        }
    }
}

/// Fluent constructor for pre-populated states.
///
/// ```
/// use stategraph::state::State;
/// use serde_json::json;
///
/// let state = State::builder()
///     .with_value("input", json!("hello"))
///     .with_metadata("origin", json!("cli"))
///     .build();
/// assert_eq!(state.get("input"), Some(json!("hello")));
/// ```
#[derive(Debug, Default)]
pub struct StateBuilder {
    data: FxHashMap<String, Value>,
    metadata: FxHashMap<String, Value>,
}

impl StateBuilder {
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn build(self) -> State {
        State::from_parts(self.data, self.metadata)
    }
}
