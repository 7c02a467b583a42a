//! Activation record detection.
//!
//! A function's prologue and epilogue adjust the stack pointer with a single
//! `addiu $sp, $sp, imm` (or `addi`). Those instructions delimit the frame that every
//! other instruction of the function addresses, so they must neither move nor be
//! rewritten. Detection marks them non-transformable in place.

use crate::{
    analysis::cfg::FunctionBoundary,
    program::{BlockId, Program},
    Result,
};

/// Position of an instruction inside the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstrRef {
    /// Owning block
    pub block: BlockId,
    /// Index within the block's instruction list
    pub index: usize,
}

/// The stack-frame adjustments of a function.
///
/// Either side may be absent: leaf functions without a frame are legal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationRecords {
    /// First `$sp` decrement of the entry block
    pub prologue: Option<InstrRef>,
    /// Last `$sp` increment of the exit block
    pub epilogue: Option<InstrRef>,
}

impl ActivationRecords {
    /// Returns `true` if neither a prologue nor an epilogue was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prologue.is_none() && self.epilogue.is_none()
    }
}

/// Finds the prologue and epilogue of a function and marks them non-transformable.
///
/// The prologue is the first stack-pointer adjustment with a negative immediate in the
/// entry block; the epilogue is the last one with a positive immediate in the exit block.
///
/// # Arguments
///
/// * `program` - The program holding the blocks
/// * `boundary` - The function's entry and exit block
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if a boundary block does not exist.
pub fn locate_activation_records(
    program: &mut Program,
    boundary: FunctionBoundary,
) -> Result<ActivationRecords> {
    let mut records = ActivationRecords::default();

    let entry = program.block_mut(boundary.entry)?;
    if let Some(index) = entry
        .instructions
        .iter()
        .position(|i| i.stack_adjustment().is_some_and(|imm| imm < 0))
    {
        entry.instructions[index].transformable = false;
        records.prologue = Some(InstrRef {
            block: boundary.entry,
            index,
        });
    }

    let exit = program.block_mut(boundary.exit)?;
    if let Some(index) = exit
        .instructions
        .iter()
        .rposition(|i| i.stack_adjustment().is_some_and(|imm| imm > 0))
    {
        exit.instructions[index].transformable = false;
        records.epilogue = Some(InstrRef {
            block: boundary.exit,
            index,
        });
    }

    if records.prologue.is_none() || records.epilogue.is_none() {
        log::debug!(
            "Incomplete activation record (prologue {:?}, epilogue {:?})",
            records.prologue,
            records.epilogue
        );
    }

    Ok(records)
}
