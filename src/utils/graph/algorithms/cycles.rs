//! Cycle detection for directed graphs.
//!
//! Hazard graphs must be acyclic by construction; control flow graphs usually are not.
//! Both use these checks, the former as a verification step and the latter to decide
//! whether a function contains loops.

use crate::utils::graph::{NodeId, Successors};

/// Returns `true` if a cycle is reachable from `start`.
pub fn has_cycle<G: Successors>(graph: &G, start: NodeId) -> bool {
    let node_count = graph.node_count();
    if start.index() >= node_count {
        return false;
    }

    let mut state = vec![VisitState::Unvisited; node_count];
    cycle_from(graph, start, &mut state)
}

/// Returns `true` if the graph contains no cycle at all.
///
/// Every node is used as a DFS root, so cycles in disconnected components are found.
pub fn is_acyclic<G: Successors>(graph: &G) -> bool {
    let mut state = vec![VisitState::Unvisited; graph.node_count()];
    graph.node_ids().all(|node| {
        state[node.index()] != VisitState::Unvisited || !cycle_from(graph, node, &mut state)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    OnStack,
    Done,
}

/// Iterative DFS; instruction-level graphs can be deep enough to overflow a recursive walk.
fn cycle_from<G: Successors>(graph: &G, start: NodeId, state: &mut [VisitState]) -> bool {
    let mut stack: Vec<(NodeId, Vec<NodeId>)> = Vec::new();
    state[start.index()] = VisitState::OnStack;
    stack.push((start, graph.successors(start).collect()));

    while let Some((node, pending)) = stack.last_mut() {
        let node = *node;
        match pending.pop() {
            Some(next) => match state[next.index()] {
                VisitState::OnStack => return true,
                VisitState::Done => {}
                VisitState::Unvisited => {
                    state[next.index()] = VisitState::OnStack;
                    let successors = graph.successors(next).collect();
                    stack.push((next, successors));
                }
            },
            None => {
                state[node.index()] = VisitState::Done;
                stack.pop();
            }
        }
    }

    false
}
