//! Generic directed graph infrastructure.
//!
//! Both graphs of the rewriting pipeline are built on this module:
//!
//! - the per-block hazard graph ([`crate::analysis::HazardGraph`]), a DAG over the
//!   instructions of one basic block
//! - the control flow graphs ([`crate::analysis::ControlFlowGraph`]), over basic blocks of
//!   the whole program or of one function
//!
//! # Key Components
//!
//! - [`NodeId`] / [`EdgeId`] - strongly-typed, sequentially assigned identifiers
//! - [`DirectedGraph`] - adjacency-list multigraph with typed node and edge data
//! - [`algorithms`] - topological sorting and cycle detection
//! - [`GraphBase`], [`Successors`], [`Predecessors`] - traits the algorithms are written against

mod directed;
mod edge;
mod node;
mod traits;

pub mod algorithms;

pub use directed::DirectedGraph;
pub use edge::EdgeId;
pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, Successors};
