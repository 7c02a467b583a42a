//! Basic blocks of a decoded program.

use crate::{
    analysis::CfgEdge,
    isa::{Instruction, OpClass},
    program::FunctionId,
};

/// A straight-line sequence of instructions with a single entry.
///
/// The start address identifies the block inside its function but is mutable: relocation
/// moves blocks by rewriting `start` and the addresses of their instructions. Everything
/// that has to survive relocation refers to a block through its
/// [`BlockId`](crate::program::BlockId) instead.
///
/// A block's instruction list is never edited in place by the pipeline. Stages build a
/// new list and swap it in through
/// [`Program::replace_instructions`](crate::program::Program::replace_instructions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// Owning function
    pub function: FunctionId,
    /// Current start address
    pub start: u64,
    /// Instructions in program order
    pub instructions: Vec<Instruction>,
    /// Outgoing control flow edges
    pub successors: Vec<CfgEdge>,
}

impl BasicBlock {
    /// Creates a block without successors.
    #[must_use]
    pub fn new(function: FunctionId, start: u64, instructions: Vec<Instruction>) -> Self {
        BasicBlock {
            function,
            start,
            instructions,
            successors: Vec::new(),
        }
    }

    /// Returns the number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the block holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the size of the block in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.instructions.len() as u64 * Instruction::SIZE
    }

    /// Returns the address of the last instruction, or `None` for an empty block.
    ///
    /// Falls back to the position implied by the start address when the last
    /// instruction is not placed yet.
    #[must_use]
    pub fn end_address(&self) -> Option<u64> {
        let last = self.instructions.last()?;
        if last.is_placed() {
            Some(last.address)
        } else {
            Some(self.start + self.size() - Instruction::SIZE)
        }
    }

    /// Returns `true` if `address` lies within the block's current extent.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.start + self.size()
    }

    /// Returns the last control transfer of the block.
    ///
    /// The transfer is either the last instruction or the one before it, when a delay
    /// slot follows.
    #[must_use]
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions
            .iter()
            .rev()
            .take(2)
            .find(|instr| instr.opcode.is_control_transfer())
    }

    /// Returns `true` if the block can fall through into the next block.
    #[must_use]
    pub fn falls_through(&self) -> bool {
        match self.terminator() {
            None => true,
            Some(instr) => !matches!(instr.class(), OpClass::Jump)
                && !(matches!(instr.class(), OpClass::JumpRegister) && instr.dests.is_empty()),
        }
    }

    /// Assigns sequential addresses from `start` at the instruction stride.
    pub fn assign_addresses(&mut self, start: u64) {
        self.start = start;
        for (index, instr) in self.instructions.iter_mut().enumerate() {
            instr.address = start + index as u64 * Instruction::SIZE;
        }
    }
}
