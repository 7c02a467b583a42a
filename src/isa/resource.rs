//! Architectural resources tracked for hazard detection.

use std::fmt;

use crate::isa::{Accumulator, Register, SyntheticReg};

/// A storage location whose access order must be preserved.
///
/// All memory accesses are coalesced into [`Resource::Memory`]; no alias analysis is
/// attempted. Synthetic registers are tracked as resources of their own, since
/// scheduling runs before allocation resolves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    /// A general-purpose register (never `$zero`)
    Gpr(Register),
    /// An accumulator half
    Acc(Accumulator),
    /// A synthetic register not yet allocated
    Synthetic(SyntheticReg),
    /// The single conservative memory resource
    Memory,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Gpr(reg) => write!(f, "{reg}"),
            Resource::Acc(acc) => write!(f, "{acc}"),
            Resource::Synthetic(reg) => write!(f, "{reg}"),
            Resource::Memory => f.write_str("mem"),
        }
    }
}
