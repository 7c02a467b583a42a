//! # mipsweave Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! of the library. Import it to get quick access to everything a transformation run
//! needs.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all mipsweave operations
pub use crate::Error;

/// The result type used throughout mipsweave
pub use crate::Result;

// ================================================================================================
// Instruction Set
// ================================================================================================

/// Instructions, operands and registers
pub use crate::isa::{
    Immediate, Instruction, OpClass, Opcode, Operand, Register, Resource, SyntheticReg,
};

/// Timing tables for the scheduler
pub use crate::isa::{LatencyModel, MipsLatencies, UnitLatencies};

// ================================================================================================
// Program Representation
// ================================================================================================

/// Decoded program arena
pub use crate::program::{BasicBlock, BlockId, Function, FunctionId, Program};

/// Binary image metadata
pub use crate::program::{BinaryImage, Permissions, Section, Symbol, SymbolKind};

// ================================================================================================
// Analysis
// ================================================================================================

/// Control flow extraction and hazard graphs
pub use crate::analysis::{
    locate_activation_records, ActivationRecords, ControlFlowGraph, DependencyGraphBuilder,
    FunctionBoundary, HazardGraph, HazardKind,
};

// ================================================================================================
// Transformation
// ================================================================================================

/// Pipeline entry point and configuration
pub use crate::compiler::{
    AllocationStrategy, TransformConfig, TransformReport, TransformStats, Transformer,
};

/// Expansion policies
pub use crate::compiler::{FnPolicy, Identity, TransformPolicy};

/// Individual stages
pub use crate::compiler::{AllocationReport, ListScheduler, RegisterAllocator};

/// Event tracking
pub use crate::compiler::{EventKind, EventLog};

// ================================================================================================
// Relocation
// ================================================================================================

/// Address space repair
pub use crate::relocation::{AddressMap, RelocationEngine, RelocationReport, SegmentAction};
