//! Workflow graph definition.
//!
//! A workflow is assembled with [`TopologyBuilder`]: register node bodies,
//! wire them with unconditional or condition-gated edges, pick a start node
//! and optional end nodes, then `build()` an immutable [`Topology`] that
//! the [engine](crate::engine) executes.
//!
//! Routing is deterministic: outgoing edges are kept in declaration order
//! and the engine takes the first viable one.

mod builder;
mod edges;
mod topology;

pub use builder::{TopologyBuilder, TopologyError};
pub use edges::{ConditionError, Edge, EdgeCondition};
pub use topology::{NodeEntry, Topology};
