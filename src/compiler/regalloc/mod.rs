//! Register allocation for synthetic registers.
//!
//! Instructions inserted by a [`TransformPolicy`](crate::compiler::TransformPolicy) name
//! their temporaries as [`SyntheticReg`](crate::isa::SyntheticReg)s. Before the program
//! can be serialized every synthetic register has to become a physical register or a
//! stack slot. Two strategies are available, selected by
//! [`TransformConfig::strategy`]:
//!
//! - [`AllocationStrategy::Naive`] - each maximal run of inserted instructions gets its
//!   own registers from the scratch pool, saved and restored around the run. Running out
//!   of registers is fatal.
//! - [`AllocationStrategy::LinearScan`] - live intervals over the whole block are
//!   assigned by linear scan; intervals that do not fit are spilled to stack slots.
//!
//! Both strategies open a stack frame for the registers they borrow and rebase the
//! `$sp`-relative operands of the code the frame encloses.
//!
//! # Examples
//!
//! ```rust,ignore
//! use mipsweave::compiler::{RegisterAllocator, TransformConfig};
//!
//! let config = TransformConfig::linear_scan();
//! let report = RegisterAllocator::new(&config).allocate_block(&mut program, block)?;
//! println!("{} registers, {} spilled", report.registers_used.len(), report.spilled);
//! ```

mod frame;
mod interval;
mod linear;
mod region;

pub use interval::{compute_intervals, linear_scan, LiveInterval, Location, ScanResult};

use crate::{
    compiler::{AllocationStrategy, TransformConfig},
    isa::{Instruction, Register},
    program::{BlockId, Program},
    Result,
};

/// Summary of the allocation of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationReport {
    /// Physical registers handed out to synthetic registers
    pub registers_used: Vec<Register>,
    /// Registers stored on frame entry (largest frame)
    pub saved: usize,
    /// Synthetic registers living in stack slots
    pub spilled: usize,
    /// Size of the largest frame in bytes
    pub frame_bytes: u64,
    /// Number of frames opened
    pub frames: usize,
}

impl AllocationReport {
    /// Returns `true` if nothing was allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Merges the report of a later frame of the same block.
    pub fn absorb(&mut self, other: AllocationReport) {
        for reg in other.registers_used {
            if !self.registers_used.contains(&reg) {
                self.registers_used.push(reg);
            }
        }
        self.saved = self.saved.max(other.saved);
        self.spilled += other.spilled;
        self.frame_bytes = self.frame_bytes.max(other.frame_bytes);
        self.frames += other.frames;
    }
}

/// Maps synthetic registers onto physical registers and stack slots.
pub struct RegisterAllocator<'a> {
    config: &'a TransformConfig,
}

impl<'a> RegisterAllocator<'a> {
    /// Creates an allocator using the strategy and registers of `config`.
    #[must_use]
    pub fn new(config: &'a TransformConfig) -> Self {
        RegisterAllocator { config }
    }

    /// Allocates the synthetic registers of one block's instructions.
    ///
    /// # Arguments
    ///
    /// * `instructions` - The block's instructions in their final order
    ///
    /// # Returns
    ///
    /// The rewritten instruction list, free of synthetic registers, and a report.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RegisterPoolExhausted`] if the naive strategy runs out of
    /// registers or spill code cannot get its temporaries,
    /// [`crate::Error::StackPointerClobbered`] if `$sp` is written inside a frame, and
    /// [`crate::Error::Malformed`] for frames that cannot be placed.
    pub fn allocate(
        &self,
        instructions: &[Instruction],
    ) -> Result<(Vec<Instruction>, AllocationReport)> {
        if !instructions.iter().any(Instruction::has_synthetic) {
            return Ok((instructions.to_vec(), AllocationReport::default()));
        }
        match self.config.strategy {
            AllocationStrategy::Naive => region::allocate_regions(instructions, self.config),
            AllocationStrategy::LinearScan => {
                linear::allocate_intervals(instructions, self.config)
            }
        }
    }

    /// Allocates one block of `program` and swaps in the rewritten instruction list.
    ///
    /// # Errors
    ///
    /// See [`RegisterAllocator::allocate`]; also fails if the block does not exist.
    pub fn allocate_block(&self, program: &mut Program, block: BlockId) -> Result<AllocationReport> {
        let current = program.block_mut(block)?;
        let (instructions, report) = self.allocate(&current.instructions)?;
        if !report.is_empty() {
            program.replace_instructions(block, instructions)?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        isa::{Register, SyntheticReg},
        test::{create_program, create_synthetic_run},
        Error,
    };

    #[test]
    fn test_strategies_agree_when_pool_suffices() -> Result<()> {
        let run = create_synthetic_run(4);
        let naive = TransformConfig::naive();
        let linear = TransformConfig::linear_scan();

        let (a, ra) = RegisterAllocator::new(&naive).allocate(&run)?;
        let (b, rb) = RegisterAllocator::new(&linear).allocate(&run)?;
        assert_eq!(a, b);
        assert_eq!(ra, rb);
        Ok(())
    }

    #[test]
    fn test_nine_synthetics_with_pool_of_eight() {
        let run = create_synthetic_run(9);
        let config = TransformConfig::naive();
        let err = RegisterAllocator::new(&config).allocate(&run).unwrap_err();
        assert!(matches!(
            err,
            Error::RegisterPoolExhausted {
                needed: 9,
                available: 8
            }
        ));

        // Linear scan spills instead.
        let config = TransformConfig::linear_scan();
        let (_, report) = RegisterAllocator::new(&config).allocate(&run).unwrap();
        assert!(report.spilled >= 1);
    }

    #[test]
    fn test_allocate_block_without_synthetics() -> Result<()> {
        let (mut program, entry, _) = create_program();
        let before = program.block(entry).unwrap().clone();
        let config = TransformConfig::new();
        let report = RegisterAllocator::new(&config).allocate_block(&mut program, entry)?;
        assert!(report.is_empty());
        assert_eq!(program.block(entry).unwrap(), &before);
        Ok(())
    }

    #[test]
    fn test_allocate_block_rewrites() -> Result<()> {
        let (mut program, entry, _) = create_program();
        let s = SyntheticReg(0);
        let mut instrs = program.block(entry).unwrap().instructions.clone();
        instrs.insert(2, Instruction::addiu(s, Register::A0, 4));
        instrs.insert(3, Instruction::sw(s, 0, Register::A1));
        program.replace_instructions(entry, instrs)?;

        let config = TransformConfig::new();
        let report = RegisterAllocator::new(&config).allocate_block(&mut program, entry)?;
        // The region names only $a0 and $a1, so the pool starts at $t0.
        assert_eq!(report.registers_used, vec![Register::T0]);
        let block = program.block(entry).unwrap();
        assert!(block.instructions.iter().all(|i| !i.has_synthetic()));
        assert_eq!(block.len(), 6 + 2 + 4);
        Ok(())
    }

    #[test]
    fn test_absorb() {
        let mut report = AllocationReport {
            registers_used: vec![Register::T0],
            saved: 1,
            spilled: 0,
            frame_bytes: 4,
            frames: 1,
        };
        report.absorb(AllocationReport {
            registers_used: vec![Register::T0, Register::T1],
            saved: 2,
            spilled: 0,
            frame_bytes: 8,
            frames: 1,
        });
        assert_eq!(report.registers_used, vec![Register::T0, Register::T1]);
        assert_eq!(report.frame_bytes, 8);
        assert_eq!(report.frames, 2);
    }
}
