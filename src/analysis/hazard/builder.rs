//! Construction of hazard graphs.

use rustc_hash::FxHashMap;

use crate::{
    analysis::hazard::{HazardGraph, HazardKind, HazardNode},
    isa::{Instruction, Resource},
    utils::graph::{DirectedGraph, NodeId},
    Result,
};

/// Access history of one resource during the reverse pass.
#[derive(Debug, Default)]
struct ResourceState {
    /// Nearest later instruction writing the resource
    last_writer: Option<NodeId>,
    /// Instructions reading the resource before `last_writer` overwrites it
    pending_readers: Vec<NodeId>,
}

/// Builds the [`HazardGraph`] of a basic block.
///
/// Instructions are visited in reverse program order while tracking, per [`Resource`],
/// the nearest later writer and the readers in between. For an instruction writing a
/// resource:
///
/// 1. every pending reader depends on it (RAW), then the pending readers are cleared
/// 2. without pending readers, the later writer depends on it (WAW); with pending
///    readers the WAR edges below already order the two writes transitively
/// 3. it becomes the resource's last writer
///
/// For an instruction reading a resource, the later writer must wait for the read (WAR)
/// unless an edge between the two was already added, and the instruction becomes a
/// pending reader.
///
/// Control transfers and non-transformable instructions are barriers: they get a
/// boundary edge from every earlier and to every later instruction. Finally the root
/// and sink edges pin the first and last instruction.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyGraphBuilder;

impl DependencyGraphBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        DependencyGraphBuilder
    }

    /// Builds the hazard graph of `instructions`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if an edge references a missing node, which
    /// indicates a bug in the builder.
    pub fn build(&self, instructions: &[Instruction]) -> Result<HazardGraph> {
        let count = instructions.len();
        let mut graph = DirectedGraph::with_capacity(count + 2, count * 2 + 2);
        let entry = graph.add_node(HazardNode::Entry);
        let nodes: Vec<NodeId> = (0..count)
            .map(|i| graph.add_node(HazardNode::Instruction(i)))
            .collect();
        let exit = graph.add_node(HazardNode::Exit);

        let mut state: FxHashMap<Resource, ResourceState> = FxHashMap::default();

        for (index, instr) in instructions.iter().enumerate().rev() {
            let current = nodes[index];

            for resource in instr.writes() {
                let slot = state.entry(resource).or_default();
                let readers = std::mem::take(&mut slot.pending_readers);
                if let Some(writer) = slot.last_writer.filter(|_| readers.is_empty()) {
                    connect(&mut graph, current, writer, HazardKind::Waw)?;
                }
                for reader in readers {
                    connect(&mut graph, current, reader, HazardKind::Raw)?;
                }
                slot.last_writer = Some(current);
            }

            for resource in instr.reads() {
                let slot = state.entry(resource).or_default();
                if let Some(writer) = slot.last_writer.filter(|w| *w != current) {
                    connect(&mut graph, current, writer, HazardKind::War)?;
                }
                slot.pending_readers.push(current);
            }
        }

        for (index, instr) in instructions.iter().enumerate() {
            if instr.opcode.is_control_transfer() || !instr.transformable {
                let barrier = nodes[index];
                for &earlier in &nodes[..index] {
                    connect(&mut graph, earlier, barrier, HazardKind::Boundary)?;
                }
                for &later in &nodes[index + 1..] {
                    connect(&mut graph, barrier, later, HazardKind::Boundary)?;
                }
            }
        }

        match (nodes.first(), nodes.last()) {
            (Some(&first), Some(&last)) => {
                graph.add_edge(entry, first, HazardKind::Boundary)?;
                for &node in &nodes[1..] {
                    if graph.in_degree(node) == 0 {
                        graph.add_edge(first, node, HazardKind::Boundary)?;
                    }
                }
                for &node in &nodes[..count - 1] {
                    if graph.out_degree(node) == 0 {
                        graph.add_edge(node, last, HazardKind::Boundary)?;
                    }
                }
                graph.add_edge(last, exit, HazardKind::Boundary)?;
            }
            _ => {
                graph.add_edge(entry, exit, HazardKind::Boundary)?;
            }
        }

        Ok(HazardGraph {
            graph,
            entry,
            exit,
            instructions: nodes,
        })
    }
}

/// Adds `from -> to` unless the two nodes are already directly connected.
fn connect(
    graph: &mut DirectedGraph<HazardNode, HazardKind>,
    from: NodeId,
    to: NodeId,
    kind: HazardKind,
) -> Result<()> {
    if from != to && graph.find_edge(from, to).is_none() {
        graph.add_edge(from, to, kind)?;
    }
    Ok(())
}
