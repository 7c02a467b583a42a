//! Instruction hazard analysis.
//!
//! For one basic block, this module builds a directed acyclic graph whose edges are the
//! ordering constraints any reschedule of the block must respect:
//!
//! - **RAW** - a read must stay after the write it observes
//! - **WAW** - two writes to the same resource keep their order
//! - **WAR** - a write must stay after every earlier read of the old value
//! - **Boundary** - pinning of the first/last instruction and of barriers
//!
//! Resources are the 31 writable general-purpose registers, the two accumulator halves,
//! synthetic registers and one coalesced memory resource (see
//! [`crate::isa::Resource`]). No alias analysis is attempted: every store conflicts with
//! every load and store of the block.
//!
//! # Examples
//!
//! ```rust,ignore
//! use mipsweave::analysis::{DependencyGraphBuilder, HazardKind};
//!
//! let graph = DependencyGraphBuilder::new().build(&block.instructions)?;
//! assert!(graph.is_acyclic());
//! for (from, to) in graph.edges_of_kind(HazardKind::Raw) {
//!     println!("{from} -> {to}");
//! }
//! ```

mod builder;
mod graph;

pub use builder::DependencyGraphBuilder;
pub use graph::{HazardGraph, HazardKind, HazardNode};
