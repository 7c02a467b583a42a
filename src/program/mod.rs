//! Decoded program representation.
//!
//! The program is an arena: functions and blocks live in flat vectors and refer to each
//! other through [`FunctionId`] and [`BlockId`] indices. Block start addresses are plain
//! mutable fields, never lookup keys, so relocation can move blocks without invalidating
//! any reference held elsewhere (snapshots, address maps, CFG nodes).
//!
//! # Key Components
//!
//! - [`Program`] - the arena, plus address and name lookups
//! - [`Function`] / [`BasicBlock`] - the arena entries
//! - [`BinaryImage`], [`Section`], [`SymbolTable`] - the binary's layout metadata
//!
//! # Examples
//!
//! ```rust,ignore
//! use mipsweave::isa::{Instruction, Register};
//! use mipsweave::program::Program;
//!
//! let mut program = Program::new();
//! let f = program.add_function("f");
//! let entry = program.add_block(f, 0x400000, vec![
//!     Instruction::addiu(Register::Sp, Register::Sp, -8).at(0x400000),
//!     Instruction::jr(Register::Ra).at(0x400004),
//!     Instruction::nop().at(0x400008),
//! ])?;
//! program.infer_edges()?;
//!
//! assert_eq!(program.block_at(0x400000), Some(entry));
//! ```

mod block;
mod elf;
mod function;
mod image;

use std::fmt;

pub use block::BasicBlock;
pub use function::Function;
pub use image::{BinaryImage, Permissions, Section, Symbol, SymbolKind, SymbolTable};

use crate::{
    analysis::CfgEdge,
    isa::{Instruction, OpClass},
    Result,
};

/// Stable index of a function in a [`Program`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FunctionId(u32);

impl FunctionId {
    /// Creates an id from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        FunctionId(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable index of a basic block in a [`Program`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlockId(u32);

impl BlockId {
    /// Creates an id from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        BlockId(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A decoded program: functions, their basic blocks and the edges between blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    functions: Vec<Function>,
    blocks: Vec<BasicBlock>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function without blocks.
    pub fn add_function(&mut self, name: impl Into<String>) -> FunctionId {
        let id = FunctionId(index_u32(self.functions.len()));
        self.functions.push(Function::new(name));
        id
    }

    /// Adds a block to `function`.
    ///
    /// # Arguments
    ///
    /// * `function` - The owning function
    /// * `start` - The block's start address
    /// * `instructions` - The block's instructions in program order
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `function` does not exist or another block of
    /// the function already starts at `start`.
    pub fn add_block(
        &mut self,
        function: FunctionId,
        start: u64,
        instructions: Vec<Instruction>,
    ) -> Result<BlockId> {
        let id = BlockId(index_u32(self.blocks.len()));
        let blocks = &self.blocks;
        let func = self
            .functions
            .get_mut(function.index())
            .ok_or_else(|| malformed_error!("Function {:?} does not exist", function))?;

        if func
            .blocks
            .iter()
            .any(|b| blocks.get(b.index()).is_some_and(|block| block.start == start))
        {
            return Err(malformed_error!(
                "Function '{}' already has a block at 0x{:08x}",
                func.name,
                start
            ));
        }

        let position = func
            .blocks
            .iter()
            .position(|b| blocks.get(b.index()).is_some_and(|block| block.start > start))
            .unwrap_or(func.blocks.len());
        func.blocks.insert(position, id);

        self.blocks
            .push(BasicBlock::new(function, start, instructions));
        Ok(id)
    }

    /// Adds a control flow edge.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if either block does not exist.
    pub fn add_edge(&mut self, from: BlockId, edge: CfgEdge) -> Result<()> {
        if self.blocks.get(edge.target().index()).is_none() {
            return Err(malformed_error!("Edge target {} does not exist", edge.target()));
        }
        let block = self.block_mut(from)?;
        if !block.successors.contains(&edge) {
            block.successors.push(edge);
        }
        Ok(())
    }

    /// Derives every block's successor edges from its terminator.
    ///
    /// Branches get a taken edge to the block starting at their target and a fall-through
    /// edge to the next block of the function; `j` gets an unconditional edge; `jal` gets
    /// a call edge to the callee's entry plus the fall-through to the return point;
    /// `jr` without a link register ends the block's flow. Existing edges are replaced.
    /// A static target that starts no block is logged and skipped.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::Error::Malformed`] from edge insertion.
    pub fn infer_edges(&mut self) -> Result<()> {
        let mut edges = Vec::new();
        for func in &self.functions {
            for (pos, &id) in func.blocks.iter().enumerate() {
                let block = &self.blocks[id.index()];
                let next = func.blocks.get(pos + 1).copied();

                let target = block
                    .terminator()
                    .and_then(Instruction::branch_target)
                    .and_then(|addr| {
                        let found = self.block_at(addr);
                        if found.is_none() {
                            log::warn!("Branch target 0x{addr:08x} of {id} starts no block");
                        }
                        found
                    });

                match block.terminator().map(Instruction::class) {
                    Some(OpClass::Branch) => {
                        if let Some(target) = target {
                            edges.push((id, CfgEdge::conditional_true(target)));
                        }
                        if let Some(next) = next {
                            edges.push((id, CfgEdge::conditional_false(next)));
                        }
                    }
                    Some(OpClass::Jump) => {
                        if let Some(target) = target {
                            edges.push((id, CfgEdge::unconditional(target)));
                        }
                    }
                    Some(OpClass::Call) => {
                        if let Some(target) = target {
                            edges.push((id, CfgEdge::call(target)));
                        }
                        if let Some(next) = next {
                            edges.push((id, CfgEdge::unconditional(next)));
                        }
                    }
                    _ => {
                        if let (true, Some(next)) = (block.falls_through(), next) {
                            edges.push((id, CfgEdge::unconditional(next)));
                        }
                    }
                }
            }
        }

        for block in &mut self.blocks {
            block.successors.clear();
        }
        for (from, edge) in edges {
            self.add_edge(from, edge)?;
        }
        Ok(())
    }

    /// Returns the function with id `id`.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    /// Returns the block with id `id`.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    /// Returns the block with id `id` for mutation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the block does not exist.
    pub fn block_mut(&mut self, id: BlockId) -> Result<&mut BasicBlock> {
        self.blocks
            .get_mut(id.index())
            .ok_or_else(|| malformed_error!("Block {} does not exist", id))
    }

    /// Returns the number of functions.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Iterates over all functions with their ids.
    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &Function)> + '_ {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FunctionId(index_u32(i)), f))
    }

    /// Iterates over all blocks with their ids.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockId(index_u32(i)), b))
    }

    /// Returns the id of the function named `name`.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| FunctionId(index_u32(i)))
    }

    /// Returns the blocks of `function` in address order.
    #[must_use]
    pub fn blocks_of(&self, function: FunctionId) -> &[BlockId] {
        self.functions
            .get(function.index())
            .map_or(&[], |f| f.blocks.as_slice())
    }

    /// Returns the block that currently starts at `address`.
    #[must_use]
    pub fn block_at(&self, address: u64) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.start == address)
            .map(|i| BlockId(index_u32(i)))
    }

    /// Returns the block whose current extent contains `address`.
    #[must_use]
    pub fn block_containing(&self, address: u64) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.contains(address))
            .map(|i| BlockId(index_u32(i)))
    }

    /// Swaps the instruction list of `block` for `instructions`.
    ///
    /// # Returns
    ///
    /// The previous instruction list.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the block does not exist.
    pub fn replace_instructions(
        &mut self,
        block: BlockId,
        instructions: Vec<Instruction>,
    ) -> Result<Vec<Instruction>> {
        let block = self.block_mut(block)?;
        Ok(std::mem::replace(&mut block.instructions, instructions))
    }

    /// Returns the lowest start and the highest end (exclusive) over a function's blocks.
    #[must_use]
    pub fn function_extent(&self, function: FunctionId) -> Option<(u64, u64)> {
        let blocks = self.blocks_of(function);
        let start = blocks
            .iter()
            .filter_map(|b| self.block(*b))
            .map(|b| b.start)
            .min()?;
        let end = blocks
            .iter()
            .filter_map(|b| self.block(*b))
            .map(|b| b.start + b.size())
            .max()?;
        Some((start, end))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn index_u32(index: usize) -> u32 {
    index as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::CfgEdgeKind,
        isa::{Opcode, Register},
        Error,
    };

    fn two_function_program() -> Result<(Program, BlockId, BlockId, BlockId)> {
        let mut program = Program::new();
        let f = program.add_function("f");
        let g = program.add_function("g");

        // Added out of order on purpose; the function keeps address order.
        let exit = program.add_block(
            f,
            0x400010,
            vec![
                Instruction::jr(Register::Ra).at(0x400010),
                Instruction::nop().at(0x400014),
            ],
        )?;
        let entry = program.add_block(
            f,
            0x400000,
            vec![
                Instruction::jal(0x400020).at(0x400000),
                Instruction::nop().at(0x400004),
                Instruction::branch(Opcode::Beq, Register::V0, Register::Zero, 0x400010)
                    .at(0x400008),
                Instruction::nop().at(0x40000c),
            ],
        )?;
        let callee = program.add_block(
            g,
            0x400020,
            vec![
                Instruction::jr(Register::Ra).at(0x400020),
                Instruction::nop().at(0x400024),
            ],
        )?;
        Ok((program, entry, exit, callee))
    }

    #[test]
    fn test_blocks_kept_in_address_order() -> Result<()> {
        let (program, entry, exit, _) = two_function_program()?;
        let f = program.function_by_name("f").ok_or(Error::NotSupported)?;
        assert_eq!(program.blocks_of(f), &[entry, exit]);
        assert_eq!(program.function_count(), 2);
        assert_eq!(program.block_count(), 3);
        Ok(())
    }

    #[test]
    fn test_duplicate_start_rejected() -> Result<()> {
        let mut program = Program::new();
        let f = program.add_function("f");
        program.add_block(f, 0x400000, vec![Instruction::nop().at(0x400000)])?;
        assert!(program.add_block(f, 0x400000, Vec::new()).is_err());
        assert!(program
            .add_block(FunctionId::new(7), 0x400000, Vec::new())
            .is_err());
        Ok(())
    }

    #[test]
    fn test_address_lookups() -> Result<()> {
        let (program, entry, exit, _) = two_function_program()?;
        assert_eq!(program.block_at(0x400010), Some(exit));
        assert_eq!(program.block_at(0x400004), None);
        assert_eq!(program.block_containing(0x400004), Some(entry));
        assert_eq!(program.block_containing(0x400100), None);
        let f = program.function_by_name("f").ok_or(Error::NotSupported)?;
        assert_eq!(program.function_extent(f), Some((0x400000, 0x400018)));
        assert_eq!(program.function_by_name("missing"), None);
        Ok(())
    }

    #[test]
    fn test_infer_edges() -> Result<()> {
        let (mut program, entry, exit, callee) = two_function_program()?;
        program.infer_edges()?;

        let successors = &program.block(entry).ok_or(Error::NotSupported)?.successors;
        assert_eq!(
            successors,
            &vec![
                CfgEdge::conditional_true(exit),
                CfgEdge::conditional_false(exit)
            ]
        );
        assert!(program
            .block(exit)
            .ok_or(Error::NotSupported)?
            .successors
            .is_empty());
        assert!(program
            .block(callee)
            .ok_or(Error::NotSupported)?
            .successors
            .iter()
            .all(|e| e.kind() != CfgEdgeKind::Call));
        Ok(())
    }

    #[test]
    fn test_replace_instructions_swaps_list() -> Result<()> {
        let (mut program, entry, _, _) = two_function_program()?;
        let old = program.replace_instructions(entry, vec![Instruction::nop()])?;
        assert_eq!(old.len(), 4);
        assert_eq!(program.block(entry).map(BasicBlock::len), Some(1));
        assert!(program
            .replace_instructions(BlockId::new(99), Vec::new())
            .is_err());
        Ok(())
    }
}
