//! Control flow edge types for the CFG.
//!
//! This module defines the edge representations used in the control flow graph,
//! providing semantic information about how control flows between basic blocks.

use crate::program::BlockId;

/// The kind of control flow represented by an edge.
///
/// # Examples
///
/// ```rust,ignore
/// use mipsweave::analysis::CfgEdgeKind;
///
/// let edge_kind = CfgEdgeKind::ConditionalTrue;
/// assert!(edge_kind.is_conditional());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CfgEdgeKind {
    /// Unconditional control flow.
    ///
    /// This includes:
    /// - `j` to a block
    /// - Fall-through from one block to the next
    /// - The single successor of a non-branching block
    Unconditional,

    /// The taken side of a conditional branch (`beq`, `bne`, `blez`, ...).
    ConditionalTrue,

    /// The fall-through side of a conditional branch.
    ConditionalFalse,

    /// Edge from a `jal` to the entry block of the callee.
    ///
    /// Call edges connect blocks of different functions; they are what neighbor
    /// widening of a function view follows into callees.
    Call,
}

impl CfgEdgeKind {
    /// Returns `true` if this is a conditional branch edge.
    ///
    /// # Returns
    ///
    /// `true` for [`ConditionalTrue`](Self::ConditionalTrue) and
    /// [`ConditionalFalse`](Self::ConditionalFalse), `false` otherwise.
    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        matches!(self, Self::ConditionalTrue | Self::ConditionalFalse)
    }

    /// Returns `true` if this edge transfers control to another function.
    #[must_use]
    pub const fn is_call(&self) -> bool {
        matches!(self, Self::Call)
    }
}

/// A successor entry of a basic block.
///
/// Each edge names its target block and carries semantic information about the type of
/// control flow.
///
/// # Examples
///
/// ```rust,ignore
/// use mipsweave::analysis::{CfgEdge, CfgEdgeKind};
/// use mipsweave::program::BlockId;
///
/// let edge = CfgEdge::new(BlockId::new(1), CfgEdgeKind::Unconditional);
/// assert_eq!(edge.target(), BlockId::new(1));
/// assert!(!edge.kind().is_conditional());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CfgEdge {
    /// The target block of this edge.
    target: BlockId,
    /// The kind of control flow this edge represents.
    kind: CfgEdgeKind,
}

impl CfgEdge {
    /// Creates a new CFG edge.
    ///
    /// # Arguments
    ///
    /// * `target` - The target block
    /// * `kind` - The kind of control flow
    #[must_use]
    pub const fn new(target: BlockId, kind: CfgEdgeKind) -> Self {
        Self { target, kind }
    }

    /// Returns the target block of this edge.
    #[must_use]
    pub const fn target(&self) -> BlockId {
        self.target
    }

    /// Returns the kind of control flow this edge represents.
    #[must_use]
    pub const fn kind(&self) -> CfgEdgeKind {
        self.kind
    }

    /// Creates an unconditional edge to the target block.
    #[must_use]
    pub const fn unconditional(target: BlockId) -> Self {
        Self::new(target, CfgEdgeKind::Unconditional)
    }

    /// Creates a conditional true edge to the target block.
    #[must_use]
    pub const fn conditional_true(target: BlockId) -> Self {
        Self::new(target, CfgEdgeKind::ConditionalTrue)
    }

    /// Creates a conditional false edge to the target block.
    #[must_use]
    pub const fn conditional_false(target: BlockId) -> Self {
        Self::new(target, CfgEdgeKind::ConditionalFalse)
    }

    /// Creates a call edge to the callee's entry block.
    #[must_use]
    pub const fn call(target: BlockId) -> Self {
        Self::new(target, CfgEdgeKind::Call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_is_conditional() {
        assert!(!CfgEdgeKind::Unconditional.is_conditional());
        assert!(CfgEdgeKind::ConditionalTrue.is_conditional());
        assert!(CfgEdgeKind::ConditionalFalse.is_conditional());
        assert!(!CfgEdgeKind::Call.is_conditional());
    }

    #[test]
    fn test_edge_kind_is_call() {
        assert!(CfgEdgeKind::Call.is_call());
        assert!(!CfgEdgeKind::Unconditional.is_call());
    }

    #[test]
    fn test_cfg_edge_factory_methods() {
        let unconditional = CfgEdge::unconditional(BlockId::new(1));
        assert_eq!(unconditional.target(), BlockId::new(1));
        assert_eq!(unconditional.kind(), CfgEdgeKind::Unconditional);

        let cond_true = CfgEdge::conditional_true(BlockId::new(2));
        assert_eq!(cond_true.kind(), CfgEdgeKind::ConditionalTrue);

        let cond_false = CfgEdge::conditional_false(BlockId::new(3));
        assert_eq!(cond_false.target(), BlockId::new(3));
        assert_eq!(cond_false.kind(), CfgEdgeKind::ConditionalFalse);

        let call = CfgEdge::call(BlockId::new(4));
        assert!(call.kind().is_call());
    }
}
