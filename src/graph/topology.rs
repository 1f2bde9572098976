//! Immutable workflow topology.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::engine::ExecutionConfig;
use crate::graph::edges::Edge;
use crate::node::Node;

/// A registered node together with its display name and body.
#[derive(Clone)]
pub struct NodeEntry {
    pub id: String,
    pub name: String,
    pub node: Arc<dyn Node>,
}

impl std::fmt::Debug for NodeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Validated, immutable workflow graph.
///
/// Built through [`TopologyBuilder`](crate::graph::TopologyBuilder) and
/// shared as `Arc<Topology>` across any number of concurrent executions.
/// Per-source edge order is declaration order, which is what makes
/// first-viable-edge routing deterministic.
#[derive(Debug)]
pub struct Topology {
    pub id: String,
    pub name: String,
    pub(crate) nodes: FxHashMap<String, NodeEntry>,
    pub(crate) edges: FxHashMap<String, Vec<Edge>>,
    pub(crate) start_node: String,
    pub(crate) end_nodes: FxHashSet<String>,
    pub(crate) config: ExecutionConfig,
}

impl Topology {
    /// Look up a registered node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodeEntry> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Ids of all registered nodes, unordered.
    #[must_use]
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Entry node of the graph.
    #[must_use]
    pub fn start_node(&self) -> &str {
        &self.start_node
    }

    /// Whether a run completes after executing `id`.
    #[must_use]
    pub fn is_end_node(&self, id: &str) -> bool {
        self.end_nodes.contains(id)
    }

    /// Outgoing edges of `id` in declaration order.
    #[must_use]
    pub fn edges_from(&self, id: &str) -> &[Edge] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Read-only adjacency view: declared targets per source node.
    ///
    /// Conditional edges contribute their declared target; the id a
    /// condition actually routes to at runtime may differ.
    #[must_use]
    pub fn adjacency(&self) -> FxHashMap<String, Vec<String>> {
        self.edges
            .iter()
            .map(|(from, edges)| {
                (
                    from.clone(),
                    edges.iter().map(|e| e.to.clone()).collect(),
                )
            })
            .collect()
    }

    /// Execution settings attached at build time.
    #[must_use]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }
}
