//! The per-block hazard graph.

use std::fmt;

use crate::utils::graph::{algorithms, DirectedGraph, NodeId};

/// Why one instruction must precede another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HazardKind {
    /// Both write the same resource
    Waw,
    /// The successor reads what the predecessor wrote
    Raw,
    /// The successor overwrites what the predecessor read
    War,
    /// Ordering constraint without a data hazard (root/sink pinning, barriers)
    Boundary,
}

impl fmt::Display for HazardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HazardKind::Waw => "WAW",
            HazardKind::Raw => "RAW",
            HazardKind::War => "WAR",
            HazardKind::Boundary => "boundary",
        };
        f.write_str(name)
    }
}

/// A vertex of the hazard graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HazardNode {
    /// Synthetic block-entry constraint
    Entry,
    /// The instruction at this position of the block
    Instruction(usize),
    /// Synthetic block-exit constraint
    Exit,
}

/// Directed acyclic graph of ordering constraints between the instructions of one block.
///
/// Every edge points from the instruction that must execute first to the one that must
/// execute later. The synthetic [`HazardNode::Entry`] is the only source and
/// [`HazardNode::Exit`] the only sink; the block's first instruction is the only
/// successor of the entry and every other instruction is reachable from it, and
/// symmetrically for the last instruction and the exit. Any topological order therefore
/// keeps the first and last instruction in place.
#[derive(Debug, Clone)]
pub struct HazardGraph {
    pub(crate) graph: DirectedGraph<HazardNode, HazardKind>,
    pub(crate) entry: NodeId,
    pub(crate) exit: NodeId,
    pub(crate) instructions: Vec<NodeId>,
}

impl HazardGraph {
    /// Returns the synthetic entry node.
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the synthetic exit node.
    #[must_use]
    pub fn exit(&self) -> NodeId {
        self.exit
    }

    /// Returns the number of instruction nodes.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Returns the node of the instruction at `index`.
    #[must_use]
    pub fn node_of(&self, index: usize) -> Option<NodeId> {
        self.instructions.get(index).copied()
    }

    /// Returns the instruction index of `node`, `None` for the synthetic nodes.
    #[must_use]
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        match self.graph.node(node) {
            Some(HazardNode::Instruction(index)) => Some(*index),
            _ => None,
        }
    }

    /// Returns the underlying directed graph.
    #[must_use]
    pub fn graph(&self) -> &DirectedGraph<HazardNode, HazardKind> {
        &self.graph
    }

    /// Returns the kind of the direct edge between two instructions, if any.
    #[must_use]
    pub fn dependency(&self, from: usize, to: usize) -> Option<HazardKind> {
        let edge = self.graph.find_edge(self.node_of(from)?, self.node_of(to)?)?;
        self.graph.edge(edge).copied()
    }

    /// Returns every edge of `kind` as `(from, to)` node pairs.
    pub fn edges_of_kind(&self, kind: HazardKind) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.graph
            .edges()
            .filter(move |(_, _, _, k)| **k == kind)
            .map(|(_, source, target, _)| (source, target))
    }

    /// Returns `true` if the graph has no cycle.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        algorithms::is_acyclic(&self.graph)
    }

    /// Returns a topological order of the instruction indices.
    ///
    /// `None` if the graph has a cycle, which construction rules out.
    #[must_use]
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let order = algorithms::topological_sort(&self.graph)?;
        Some(order.into_iter().filter_map(|n| self.index_of(n)).collect())
    }
}
