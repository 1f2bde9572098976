//! Fluent construction and validation of workflow topologies.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::engine::ExecutionConfig;
use crate::graph::edges::{Edge, EdgeCondition};
use crate::graph::topology::{NodeEntry, Topology};
use crate::node::Node;

/// Errors raised while assembling a [`Topology`].
///
/// Construction fails fast: the first offending call reports the problem,
/// rather than deferring everything to `build()`.
#[derive(Debug, Error, Diagnostic)]
pub enum TopologyError {
    #[error("duplicate node id: {id}")]
    #[diagnostic(
        code(stategraph::graph::duplicate_node),
        help("Each node id may be registered only once per topology.")
    )]
    DuplicateNode { id: String },

    #[error("unknown node id: {id}")]
    #[diagnostic(
        code(stategraph::graph::unknown_node),
        help("Register the node with `add_node` before referencing it.")
    )]
    UnknownNode { id: String },

    #[error("topology has no start node")]
    #[diagnostic(
        code(stategraph::graph::no_start_node),
        help("Call `with_start_node` before `build`.")
    )]
    NoStartNode,
}

/// Builder for [`Topology`].
///
/// Methods consume and return the builder so construction chains with `?`:
///
/// ```
/// use stategraph::graph::TopologyBuilder;
/// use stategraph::node::{Node, NodeContext, NodeError};
/// use stategraph::state::State;
/// use async_trait::async_trait;
///
/// struct Passthrough;
///
/// #[async_trait]
/// impl Node for Passthrough {
///     async fn run(&self, _ctx: NodeContext, state: State) -> Result<State, NodeError> {
///         Ok(state)
///     }
/// }
///
/// # fn main() -> Result<(), stategraph::graph::TopologyError> {
/// let topology = TopologyBuilder::new("wf", "demo workflow")
///     .add_node("a", "first", Passthrough)?
///     .add_node("b", "second", Passthrough)?
///     .add_edge("a", "b")?
///     .with_start_node("a")?
///     .add_end_node("b")?
///     .build()?;
/// assert_eq!(topology.start_node(), "a");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TopologyBuilder {
    id: String,
    name: String,
    nodes: FxHashMap<String, NodeEntry>,
    edges: FxHashMap<String, Vec<Edge>>,
    start_node: Option<String>,
    end_nodes: FxHashSet<String>,
    config: ExecutionConfig,
}

impl TopologyBuilder {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
            start_node: None,
            end_nodes: FxHashSet::default(),
            config: ExecutionConfig::default(),
        }
    }

    /// Register a node body under `id` with a human-readable `name`.
    pub fn add_node(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        node: impl Node + 'static,
    ) -> Result<Self, TopologyError> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(TopologyError::DuplicateNode { id });
        }
        self.nodes.insert(
            id.clone(),
            NodeEntry {
                id,
                name: name.into(),
                node: Arc::new(node),
            },
        );
        Ok(self)
    }

    /// Add an unconditional edge. Both endpoints must already be registered.
    pub fn add_edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<Self, TopologyError> {
        let from = from.into();
        let to = to.into();
        self.require_node(&from)?;
        self.require_node(&to)?;
        self.edges
            .entry(from.clone())
            .or_default()
            .push(Edge::unconditional(from, to));
        Ok(self)
    }

    /// Add an edge gated by `condition`. The declared target must be
    /// registered; the condition may still route elsewhere at runtime.
    pub fn add_conditional_edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: EdgeCondition,
    ) -> Result<Self, TopologyError> {
        let from = from.into();
        let to = to.into();
        self.require_node(&from)?;
        self.require_node(&to)?;
        self.edges
            .entry(from.clone())
            .or_default()
            .push(Edge::conditional(from, to, condition));
        Ok(self)
    }

    /// Designate the entry node for execution.
    pub fn with_start_node(mut self, id: impl Into<String>) -> Result<Self, TopologyError> {
        let id = id.into();
        self.require_node(&id)?;
        self.start_node = Some(id);
        Ok(self)
    }

    /// Mark a node as terminal: the run completes after it executes.
    pub fn add_end_node(mut self, id: impl Into<String>) -> Result<Self, TopologyError> {
        let id = id.into();
        self.require_node(&id)?;
        self.end_nodes.insert(id);
        Ok(self)
    }

    /// Attach execution settings for runs over this topology.
    #[must_use]
    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Finalize into an immutable [`Topology`].
    pub fn build(self) -> Result<Topology, TopologyError> {
        let start_node = self.start_node.ok_or(TopologyError::NoStartNode)?;
        Ok(Topology {
            id: self.id,
            name: self.name,
            nodes: self.nodes,
            edges: self.edges,
            start_node,
            end_nodes: self.end_nodes,
            config: self.config,
        })
    }

    fn require_node(&self, id: &str) -> Result<(), TopologyError> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(TopologyError::UnknownNode { id: id.to_string() })
        }
    }
}
