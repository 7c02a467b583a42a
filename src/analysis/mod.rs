//! Program analysis infrastructure for MIPS executables.
//!
//! This module provides the analyses the rewriting pipeline runs before it changes any
//! instruction. It builds upon the generic graph infrastructure in
//! [`crate::utils::graph`] to provide domain-specific analysis tools.
//!
//! # Architecture
//!
//! The analysis module is organized into focused sub-modules:
//!
//! - [`cfg`] - Control flow graph construction, function extraction, boundary and
//!   activation record detection
//! - [`hazard`] - Per-block instruction dependency graphs for scheduling
//!
//! # Usage
//!
//! ```rust,ignore
//! use mipsweave::analysis::{ControlFlowGraph, DependencyGraphBuilder};
//!
//! let cfg = ControlFlowGraph::from_program(&program)?;
//! let view = cfg.function_view("main", 0)?;
//! for block in view.transformable_blocks(&program) {
//!     let hazards = DependencyGraphBuilder::new().build(&program.block(block).unwrap().instructions)?;
//!     assert!(hazards.is_acyclic());
//! }
//! ```

pub mod cfg;
pub mod hazard;

// Re-export primary types at module level
pub use cfg::{
    locate_activation_records, ActivationRecords, CfgEdge, CfgEdgeKind, CfgNode,
    ControlFlowGraph, FunctionBoundary, InstrRef,
};
pub use hazard::{DependencyGraphBuilder, HazardGraph, HazardKind, HazardNode};

#[cfg(test)]
mod tests {
    use crate::{
        analysis::{locate_activation_records, ControlFlowGraph, DependencyGraphBuilder},
        test::create_program,
        Result,
    };

    #[test]
    fn test_activation_records_pin_prologue_in_hazard_graph() -> Result<()> {
        let (mut program, entry, _) = create_program();
        let view = ControlFlowGraph::from_program(&program)?.function_view("f", 0)?;
        let boundary = view.locate_boundary()?;
        locate_activation_records(&mut program, boundary)?;

        let block = program.block(entry).unwrap();
        let graph = DependencyGraphBuilder::new().build(&block.instructions)?;
        let order = graph.topological_order().unwrap();
        assert_eq!(order.first(), Some(&0));

        // The prologue is a barrier: every other instruction depends on it.
        for index in 1..block.len() {
            assert!(graph.dependency(0, index).is_some());
        }
        Ok(())
    }

    #[test]
    fn test_every_block_graph_is_acyclic() -> Result<()> {
        let (program, _, _) = create_program();
        let view = ControlFlowGraph::from_program(&program)?.function_view("f", 0)?;
        for block in view.transformable_blocks(&program) {
            let instructions = &program.block(block).unwrap().instructions;
            let graph = DependencyGraphBuilder::new().build(instructions)?;
            assert!(graph.is_acyclic());
            assert_eq!(graph.instruction_count(), instructions.len());
        }
        Ok(())
    }
}
