//! Node identifier for directed graphs.
//!
//! [`NodeId`] is a strongly-typed index into a [`DirectedGraph`](crate::utils::graph::DirectedGraph).
//! Hazard graphs use it to name instructions of a block, control flow graphs use it to
//! name copied basic blocks; the newtype keeps those indices from being mixed up with
//! instruction positions, block ids or addresses.

use std::fmt;

/// A strongly-typed identifier for nodes within a directed graph.
///
/// Node ids are assigned sequentially from 0 by
/// [`DirectedGraph::add_node`](crate::utils::graph::DirectedGraph::add_node), which makes
/// them usable as indices into side tables (scheduling metrics, visited sets, ...).
///
/// # Examples
///
/// ```rust,ignore
/// use mipsweave::utils::graph::{DirectedGraph, NodeId};
///
/// let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
/// let lw = graph.add_node("lw $t0, 0($a0)");
/// let addu = graph.add_node("addu $v0, $t0, $t1");
///
/// assert_eq!(lw, NodeId::new(0));
/// assert_eq!(addu.index(), 1);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index value.
    ///
    /// Normal usage obtains ids from `add_node`; this constructor exists for
    /// side-table lookups and tests.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw 0-based index of this node.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}
