//! Control Flow Graph implementation.
//!
//! This module provides the main [`ControlFlowGraph`] structure, used both for the
//! whole-program graph and for per-function views extracted from it.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    analysis::cfg::CfgEdgeKind,
    program::{BlockId, FunctionId, Program},
    utils::graph::{algorithms, DirectedGraph, EdgeId, NodeId},
    Error, Result,
};

/// A node of the control flow graph.
///
/// Nodes refer to blocks of the [`Program`] arena by id, so a graph stays valid while
/// relocation rewrites block addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgNode {
    /// The basic block this node stands for
    pub block: BlockId,
    /// The function owning the block
    pub function: FunctionId,
    /// `true` for blocks pulled into a function view by neighbor widening
    pub foreign: bool,
}

/// The unique entry and exit block of a function view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionBoundary {
    /// Block without in-function predecessor
    pub entry: BlockId,
    /// Block without in-function successor
    pub exit: BlockId,
}

/// A control flow graph over basic blocks.
///
/// Two kinds of graphs exist: the program graph built by
/// [`from_program`](Self::from_program), and function views extracted from it by
/// [`function_view`](Self::function_view). A view is a detached copy; mutating the
/// program graph afterwards (or building a new one) does not affect it.
///
/// # Examples
///
/// ```rust,ignore
/// use mipsweave::analysis::ControlFlowGraph;
///
/// let cfg = ControlFlowGraph::from_program(&program)?;
/// let view = cfg.function_view("main", 1)?;
/// let boundary = view.locate_boundary()?;
/// println!("main: entry {} exit {}", boundary.entry, boundary.exit);
/// ```
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    /// The underlying directed graph structure.
    graph: DirectedGraph<CfgNode, CfgEdgeKind>,
    /// Node of each block present in the graph.
    nodes: FxHashMap<BlockId, NodeId>,
    /// Function names, indexed by [`FunctionId`].
    function_names: Vec<String>,
    /// Name of the function a view was extracted for.
    function: Option<String>,
}

impl ControlFlowGraph {
    /// Builds the whole-program control flow graph.
    ///
    /// Every block becomes a node; every successor entry of a block becomes an edge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if a successor names a block that does not exist.
    pub fn from_program(program: &Program) -> Result<Self> {
        let mut graph = DirectedGraph::with_capacity(program.block_count(), program.block_count());
        let mut nodes = FxHashMap::default();

        for (id, block) in program.blocks() {
            let node = graph.add_node(CfgNode {
                block: id,
                function: block.function,
                foreign: false,
            });
            nodes.insert(id, node);
        }

        for (id, block) in program.blocks() {
            let source = nodes[&id];
            for edge in &block.successors {
                let target = nodes.get(&edge.target()).copied().ok_or_else(|| {
                    malformed_error!("Block {} has successor {} outside the program", id, edge.target())
                })?;
                graph.add_edge(source, target, edge.kind())?;
            }
        }

        Ok(ControlFlowGraph {
            graph,
            nodes,
            function_names: program.functions().map(|(_, f)| f.name.clone()).collect(),
            function: None,
        })
    }

    /// Extracts the view of one function.
    ///
    /// Copies every block of the function named `name` and every edge between copied
    /// blocks. With `neighbor_degree > 0` the view is widened that many times: each round
    /// copies the far endpoint of every edge that has exactly one endpoint in the view,
    /// marking it [`foreign`](CfgNode::foreign). Edges are copied again after each round.
    ///
    /// # Arguments
    ///
    /// * `name` - Exact function name
    /// * `neighbor_degree` - Number of widening rounds
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no block belongs to a function named `name`.
    pub fn function_view(&self, name: &str, neighbor_degree: usize) -> Result<Self> {
        let mut included: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|(_, node)| {
                self.function_names
                    .get(node.function.index())
                    .is_some_and(|n| n == name)
            })
            .map(|(id, _)| id)
            .collect();

        if included.is_empty() {
            return Err(Error::NotFound {
                name: name.to_string(),
            });
        }

        let mut members: FxHashSet<NodeId> = included.iter().copied().collect();
        let mut foreign = FxHashSet::default();

        for _ in 0..neighbor_degree {
            let mut frontier = Vec::new();
            for (_, source, target, _) in self.graph.edges() {
                let outside = match (members.contains(&source), members.contains(&target)) {
                    (true, false) => target,
                    (false, true) => source,
                    _ => continue,
                };
                if !frontier.contains(&outside) {
                    frontier.push(outside);
                }
            }
            if frontier.is_empty() {
                break;
            }
            for node in frontier {
                members.insert(node);
                foreign.insert(node);
                included.push(node);
            }
        }

        let mut graph = DirectedGraph::with_capacity(included.len(), included.len());
        let mut nodes = FxHashMap::default();
        let mut remap = FxHashMap::default();
        for old in &included {
            if let Some(data) = self.graph.node(*old) {
                let node = graph.add_node(CfgNode {
                    foreign: foreign.contains(old),
                    ..*data
                });
                nodes.insert(data.block, node);
                remap.insert(*old, node);
            }
        }
        for (_, source, target, kind) in self.graph.edges() {
            if let (Some(&s), Some(&t)) = (remap.get(&source), remap.get(&target)) {
                graph.add_edge(s, t, *kind)?;
            }
        }

        Ok(ControlFlowGraph {
            graph,
            nodes,
            function_names: self.function_names.clone(),
            function: Some(name.to_string()),
        })
    }

    /// Locates the unique entry and exit block of a function view.
    ///
    /// Only the function's own blocks and the non-call edges between them count: the
    /// entry is the single block without such a predecessor, the exit the single block
    /// without such a successor. A single-block function is its own entry and exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousBoundary`] if either count differs from one. Functions
    /// with several return paths and no unifying exit block land here and must be
    /// rejected or pre-split by the caller.
    pub fn locate_boundary(&self) -> Result<FunctionBoundary> {
        let own = |node: NodeId| self.graph.node(node).is_some_and(|n| !n.foreign);
        let internal = |kind: &CfgEdgeKind| !kind.is_call();

        let mut entries = Vec::new();
        let mut exits = Vec::new();
        for (id, node) in self.graph.nodes().filter(|(_, n)| !n.foreign) {
            let has_pred = self
                .graph
                .incoming_edges(id)
                .any(|(edge, kind)| internal(kind) && self.edge_source(edge).is_some_and(own));
            let has_succ = self
                .graph
                .outgoing_edges(id)
                .any(|(edge, kind)| internal(kind) && self.edge_target(edge).is_some_and(own));
            if !has_pred {
                entries.push(node.block);
            }
            if !has_succ {
                exits.push(node.block);
            }
        }

        match (entries.as_slice(), exits.as_slice()) {
            ([entry], [exit]) => Ok(FunctionBoundary {
                entry: *entry,
                exit: *exit,
            }),
            _ => Err(Error::AmbiguousBoundary {
                function: self.function.clone().unwrap_or_default(),
                entries: entries.len(),
                exits: exits.len(),
            }),
        }
    }

    /// Returns the function's own blocks in ascending address order.
    ///
    /// Blocks pulled in by neighbor widening are excluded; they are never transformed.
    #[must_use]
    pub fn transformable_blocks(&self, program: &Program) -> Vec<BlockId> {
        let mut blocks: Vec<BlockId> = self
            .graph
            .nodes()
            .filter(|(_, n)| !n.foreign)
            .map(|(_, n)| n.block)
            .collect();
        blocks.sort_by_key(|b| program.block(*b).map_or(u64::MAX, |block| block.start));
        blocks
    }

    /// Returns the name of the function a view was extracted for.
    #[must_use]
    pub fn function_name(&self) -> Option<&str> {
        self.function.as_deref()
    }

    /// Returns the number of blocks in the graph.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the node standing for `block`.
    #[must_use]
    pub fn node_of(&self, block: BlockId) -> Option<NodeId> {
        self.nodes.get(&block).copied()
    }

    /// Returns the data of `node`.
    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<&CfgNode> {
        self.graph.node(node)
    }

    /// Returns `true` if `block` is part of the graph.
    #[must_use]
    pub fn contains_block(&self, block: BlockId) -> bool {
        self.nodes.contains_key(&block)
    }

    /// Returns the blocks directly reachable from `block`.
    pub fn successors(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.node_of(block)
            .into_iter()
            .flat_map(|n| self.graph.successors(n))
            .filter_map(|n| self.graph.node(n).map(|d| d.block))
    }

    /// Returns the blocks with an edge into `block`.
    pub fn predecessors(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.node_of(block)
            .into_iter()
            .flat_map(|n| self.graph.predecessors(n))
            .filter_map(|n| self.graph.node(n).map(|d| d.block))
    }

    /// Returns `true` if the graph contains no cycle (no loops, no recursion).
    #[must_use]
    pub fn is_loop_free(&self) -> bool {
        algorithms::is_acyclic(&self.graph)
    }

    /// Returns the underlying directed graph.
    #[must_use]
    pub fn graph(&self) -> &DirectedGraph<CfgNode, CfgEdgeKind> {
        &self.graph
    }

    fn edge_source(&self, edge: EdgeId) -> Option<NodeId> {
        self.graph.edge_endpoints(edge).map(|(s, _)| s)
    }

    fn edge_target(&self, edge: EdgeId) -> Option<NodeId> {
        self.graph.edge_endpoints(edge).map(|(_, t)| t)
    }
}
