//! Edges and runtime routing conditions.

use std::fmt;
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

use crate::state::State;

/// Predicate evaluated against the working state to decide whether an edge
/// is taken, and where it leads.
///
/// Returning `Ok(Some(id))` routes to `id` (which may differ from the
/// edge's declared target); `Ok(None)` or an empty id means the edge is not
/// taken. Errors are terminal for the run.
pub type EdgeCondition = Arc<dyn Fn(&State) -> Result<Option<String>, ConditionError> + Send + Sync>;

/// A condition's evaluation failed.
#[derive(Debug, Error, Diagnostic)]
#[error("edge condition failed: {message}")]
#[diagnostic(
    code(stategraph::graph::condition),
    help("Conditions must not fail for routing decisions; return Ok(None) to skip an edge.")
)]
pub struct ConditionError {
    pub message: String,
}

impl ConditionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Directed connection between two registered nodes.
///
/// Unconditional edges are always viable and route to their declared
/// target. Conditional edges delegate the decision (and the actual target)
/// to their [`EdgeCondition`].
#[derive(Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    condition: Option<EdgeCondition>,
}

impl Edge {
    pub(crate) fn unconditional(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: None,
        }
    }

    pub(crate) fn conditional(
        from: impl Into<String>,
        to: impl Into<String>,
        condition: EdgeCondition,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: Some(condition),
        }
    }

    /// Whether this edge carries a runtime condition.
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Evaluate viability against `state`. Returns the routed target id, or
    /// `None` when the edge is not taken.
    pub(crate) fn evaluate(&self, state: &State) -> Result<Option<String>, ConditionError> {
        match &self.condition {
            None => Ok(Some(self.to.clone())),
            Some(condition) => match condition(state)? {
                Some(target) if !target.is_empty() => Ok(Some(target)),
                _ => Ok(None),
            },
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("conditional", &self.is_conditional())
            .finish()
    }
}
