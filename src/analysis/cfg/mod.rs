//! Control Flow Graph (CFG) construction and function extraction.
//!
//! This module provides the graph abstraction over the basic blocks of a decoded MIPS
//! program, and the operations the rewriting pipeline needs to isolate one function.
//!
//! # Architecture
//!
//! The CFG builds upon the generic [`crate::utils::graph::DirectedGraph`] infrastructure.
//! Nodes are [`CfgNode`]s referring to blocks of the [`crate::program::Program`] arena by
//! id; edges carry a [`CfgEdgeKind`].
//!
//! # Key Components
//!
//! - [`ControlFlowGraph`] - Program graph and per-function views
//! - [`FunctionBoundary`] - The unique entry and exit block of a function
//! - [`locate_activation_records`] - Prologue/epilogue detection
//! - [`CfgEdge`] / [`CfgEdgeKind`] - Edge representation with control flow semantics
//!
//! # Examples
//!
//! ```rust,ignore
//! use mipsweave::analysis::{locate_activation_records, ControlFlowGraph};
//!
//! let cfg = ControlFlowGraph::from_program(&program)?;
//! let view = cfg.function_view("f", 0)?;
//! let boundary = view.locate_boundary()?;
//! let records = locate_activation_records(&mut program, boundary)?;
//! ```

mod activation;
mod edge;
mod graph;

pub use activation::{locate_activation_records, ActivationRecords, InstrRef};
pub use edge::{CfgEdge, CfgEdgeKind};
pub use graph::{CfgNode, ControlFlowGraph, FunctionBoundary};
