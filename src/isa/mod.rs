//! MIPS32 instruction set model.
//!
//! This module describes instructions the way the rest of the pipeline consumes them:
//! already decoded, with normalized operands and with implicit effects made queryable.
//! Decoding raw instruction words and encoding them back is left to the surrounding
//! disassembler and serializer.
//!
//! # Key Components
//!
//! - [`Register`], [`Accumulator`], [`SyntheticReg`], [`Operand`] - register operands
//! - [`Opcode`], [`OpClass`], [`Format`], [`MemWidth`] - operation descriptions
//! - [`Instruction`], [`Immediate`] - a single instruction with placement information
//! - [`Resource`] - architectural storage tracked for hazards
//! - [`LatencyModel`], [`MipsLatencies`], [`UnitLatencies`] - timing tables for scheduling
//!
//! # Examples
//!
//! ```rust,ignore
//! use mipsweave::isa::{Instruction, Register, Resource};
//!
//! let store = Instruction::sw(Register::Ra, 20, Register::Sp);
//! assert!(store.writes().contains(&Resource::Memory));
//! assert_eq!(store.to_string(), "sw $ra, 20($sp)");
//! ```

mod instruction;
mod latency;
mod opcode;
mod register;
mod resource;

pub use instruction::{Immediate, Instruction};
pub use latency::{LatencyModel, MipsLatencies, UnitLatencies};
pub use opcode::{Format, MemWidth, OpClass, Opcode};
pub use register::{Accumulator, Operand, Register, SyntheticReg};
pub use resource::Resource;
