//! Collider Graph
//!
//! Derives the dependency structure of a workflow from its stored subtask
//! results. Relations are kept as subtask ids and never resolved into object
//! references: a referenced subtask may already have been removed from the
//! store.
//!
//! - [`build_graph`] produces one [`DependencyGraphNode`] per result, in input
//!   order, for snapshots.
//! - [`DependencyGraph`] indexes those nodes for traversal (roots, upstream
//!   and downstream lookups, join points, level grouping).
//!
//! No cycle detection is performed; the scheduler that produced the results is
//! responsible for keeping the graph acyclic.

mod error;
mod graph;
mod node;

pub use error::GraphError;
pub use graph::DependencyGraph;
pub use node::{DependencyGraphNode, build_graph};
