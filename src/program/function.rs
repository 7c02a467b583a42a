//! Functions of a decoded program.

use crate::program::BlockId;

/// A named set of basic blocks.
///
/// Blocks are kept in ascending order of their start address; relocation preserves the
/// relative order of a function's blocks, so the order stays valid after addresses change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Symbol name
    pub name: String,
    /// Member blocks in address order
    pub blocks: Vec<BlockId>,
}

impl Function {
    /// Creates a function without blocks.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Function {
            name: name.into(),
            blocks: Vec::new(),
        }
    }
}
