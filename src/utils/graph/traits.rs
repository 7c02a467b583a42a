//! Trait definitions for graph abstractions.
//!
//! Algorithms in [`crate::utils::graph::algorithms`] are written against these traits
//! rather than against [`DirectedGraph`](crate::utils::graph::DirectedGraph), so the
//! hazard graph and the control flow graph wrappers can expose their underlying graph
//! to them without copying.
//!
//! - [`GraphBase`] - node count and node iteration
//! - [`Successors`] - forward traversal
//! - [`Predecessors`] - backward traversal

use crate::utils::graph::NodeId;

/// Core properties shared by all graph types.
pub trait GraphBase {
    /// Returns the number of nodes in the graph.
    fn node_count(&self) -> usize;

    /// Returns an iterator over all node ids, in ascending order.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Forward edge traversal.
pub trait Successors: GraphBase {
    /// Returns the direct successors of `node`.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Backward edge traversal.
pub trait Predecessors: GraphBase {
    /// Returns the direct predecessors of `node`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}
