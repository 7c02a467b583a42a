//! Topological sorting for directed acyclic graphs.
//!
//! Kahn's algorithm: repeatedly emit a node whose predecessors have all been emitted.
//! The hazard graph uses it to validate schedules and the list scheduler follows the
//! same ready-set discipline with a priority order instead of a FIFO queue.

use std::collections::VecDeque;

use crate::utils::graph::{GraphBase, NodeId, Predecessors, Successors};

/// Computes a topological ordering of all nodes.
///
/// Ties are broken by node id (nodes become ready in ascending id order), so the
/// result is deterministic for a given graph.
///
/// # Returns
///
/// `Some(order)` if the graph is acyclic, `None` if it contains a cycle.
///
/// # Examples
///
/// ```rust,ignore
/// use mipsweave::utils::graph::{algorithms::topological_sort, DirectedGraph};
///
/// let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
/// let def = graph.add_node("addiu $t0, $zero, 1");
/// let use_ = graph.add_node("sw $t0, 0($sp)");
/// graph.add_edge(def, use_, ())?;
///
/// assert_eq!(topological_sort(&graph), Some(vec![def, use_]));
/// ```
pub fn topological_sort<G>(graph: &G) -> Option<Vec<NodeId>>
where
    G: GraphBase + Successors + Predecessors,
{
    let node_count = graph.node_count();
    if node_count == 0 {
        return Some(Vec::new());
    }

    let mut in_degree: Vec<usize> = vec![0; node_count];
    for node in graph.node_ids() {
        in_degree[node.index()] = graph.predecessors(node).count();
    }

    let mut queue: VecDeque<NodeId> = graph
        .node_ids()
        .filter(|node| in_degree[node.index()] == 0)
        .collect();

    let mut result = Vec::with_capacity(node_count);

    while let Some(node) = queue.pop_front() {
        result.push(node);

        for successor in graph.successors(node) {
            in_degree[successor.index()] -= 1;
            if in_degree[successor.index()] == 0 {
                queue.push_back(successor);
            }
        }
    }

    // Unprocessed nodes are stuck behind a cycle
    if result.len() == node_count {
        Some(result)
    } else {
        None
    }
}

/// Returns `true` if `order` lists every node exactly once and respects every edge.
pub fn is_topological_order<G>(graph: &G, order: &[NodeId]) -> bool
where
    G: GraphBase + Successors,
{
    let node_count = graph.node_count();
    if order.len() != node_count {
        return false;
    }

    let mut position = vec![usize::MAX; node_count];
    for (pos, node) in order.iter().enumerate() {
        if node.index() >= node_count || position[node.index()] != usize::MAX {
            return false;
        }
        position[node.index()] = pos;
    }

    graph.node_ids().all(|node| {
        graph
            .successors(node)
            .all(|succ| position[node.index()] < position[succ.index()])
    })
}
