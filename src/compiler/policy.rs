//! Instruction expansion policies.
//!
//! A [`TransformPolicy`] decides what replaces each original instruction. The pipeline
//! calls it once per transformable instruction and splices the returned sequence into
//! the block in place of the original. Inserted instructions are expected to use
//! [`SyntheticReg`](crate::isa::SyntheticReg)s for any temporaries they need; the register
//! allocator maps them onto physical registers afterwards.
//!
//! # Examples
//!
//! ```rust,ignore
//! use mipsweave::compiler::FnPolicy;
//! use mipsweave::isa::{Instruction, OpClass};
//!
//! // Duplicate every store.
//! let policy = FnPolicy::new(|instr: &Instruction| {
//!     if instr.class() == OpClass::Store {
//!         vec![instr.clone(), instr.clone()]
//!     } else {
//!         vec![instr.clone()]
//!     }
//! });
//! ```

use crate::isa::Instruction;

/// Decides which instructions stand in place of an original instruction.
pub trait TransformPolicy: Send + Sync {
    /// Returns the sequence replacing `instruction`.
    ///
    /// Only transformable instructions ahead of a block's last control transfer are
    /// offered. Branches, jumps, delay slots, activation record instructions and
    /// everything after the last control transfer are kept as they are and never reach
    /// the policy.
    ///
    /// Synthetic register ids are scoped to one run of inserted code, so every expansion
    /// may reuse the same ids. A value must be written before it is read within the
    /// run that uses it.
    ///
    /// Returning `vec![instruction.clone()]` keeps the instruction unchanged; an empty
    /// vector deletes it. The first returned instruction with the original's opcode and
    /// operands inherits its address and origin; every other one is inserted code.
    fn expand(&self, instruction: &Instruction) -> Vec<Instruction>;

    /// Name used in log output.
    fn name(&self) -> &'static str {
        "policy"
    }
}

/// Keeps every instruction unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl TransformPolicy for Identity {
    fn expand(&self, instruction: &Instruction) -> Vec<Instruction> {
        vec![instruction.clone()]
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Adapts a closure into a [`TransformPolicy`].
pub struct FnPolicy<F> {
    expand: F,
}

impl<F> FnPolicy<F>
where
    F: Fn(&Instruction) -> Vec<Instruction> + Send + Sync,
{
    /// Wraps `expand`.
    #[must_use]
    pub fn new(expand: F) -> Self {
        FnPolicy { expand }
    }
}

impl<F> TransformPolicy for FnPolicy<F>
where
    F: Fn(&Instruction) -> Vec<Instruction> + Send + Sync,
{
    fn expand(&self, instruction: &Instruction) -> Vec<Instruction> {
        (self.expand)(instruction)
    }

    fn name(&self) -> &'static str {
        "closure"
    }
}
