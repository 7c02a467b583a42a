//! MIPS register model.
//!
//! Three kinds of register operands appear in instructions:
//!
//! - [`Register`] - the 32 architectural general-purpose registers
//! - [`Accumulator`] - the `hi`/`lo` halves written by multiply/divide
//! - [`SyntheticReg`] - placeholders introduced by inserted code, resolved to a
//!   [`Register`] (or a stack slot) by the register allocator
//!
//! Register names come from a single `const` table ([`Register::ALL`]) plus the strum
//! derives, so there is no lazily initialized lookup state.

use std::fmt;

use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// A MIPS general-purpose register, named by its o32 ABI role.
///
/// The discriminant is the hardware register number.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    IntoStaticStr,
    EnumIter,
    EnumCount,
)]
#[repr(u8)]
pub enum Register {
    /// Hard-wired zero
    #[strum(serialize = "$zero")]
    Zero = 0,
    /// Assembler temporary
    #[strum(serialize = "$at")]
    At,
    #[strum(serialize = "$v0")]
    V0,
    #[strum(serialize = "$v1")]
    V1,
    #[strum(serialize = "$a0")]
    A0,
    #[strum(serialize = "$a1")]
    A1,
    #[strum(serialize = "$a2")]
    A2,
    #[strum(serialize = "$a3")]
    A3,
    #[strum(serialize = "$t0")]
    T0,
    #[strum(serialize = "$t1")]
    T1,
    #[strum(serialize = "$t2")]
    T2,
    #[strum(serialize = "$t3")]
    T3,
    #[strum(serialize = "$t4")]
    T4,
    #[strum(serialize = "$t5")]
    T5,
    #[strum(serialize = "$t6")]
    T6,
    #[strum(serialize = "$t7")]
    T7,
    #[strum(serialize = "$s0")]
    S0,
    #[strum(serialize = "$s1")]
    S1,
    #[strum(serialize = "$s2")]
    S2,
    #[strum(serialize = "$s3")]
    S3,
    #[strum(serialize = "$s4")]
    S4,
    #[strum(serialize = "$s5")]
    S5,
    #[strum(serialize = "$s6")]
    S6,
    #[strum(serialize = "$s7")]
    S7,
    #[strum(serialize = "$t8")]
    T8,
    #[strum(serialize = "$t9")]
    T9,
    /// Reserved for the kernel
    #[strum(serialize = "$k0")]
    K0,
    /// Reserved for the kernel
    #[strum(serialize = "$k1")]
    K1,
    /// Global pointer
    #[strum(serialize = "$gp")]
    Gp,
    /// Stack pointer
    #[strum(serialize = "$sp")]
    Sp,
    /// Frame pointer
    #[strum(serialize = "$fp")]
    Fp,
    /// Return address
    #[strum(serialize = "$ra")]
    Ra,
}

impl Register {
    /// All registers, indexed by hardware number.
    pub const ALL: [Register; 32] = [
        Register::Zero,
        Register::At,
        Register::V0,
        Register::V1,
        Register::A0,
        Register::A1,
        Register::A2,
        Register::A3,
        Register::T0,
        Register::T1,
        Register::T2,
        Register::T3,
        Register::T4,
        Register::T5,
        Register::T6,
        Register::T7,
        Register::S0,
        Register::S1,
        Register::S2,
        Register::S3,
        Register::S4,
        Register::S5,
        Register::S6,
        Register::S7,
        Register::T8,
        Register::T9,
        Register::K0,
        Register::K1,
        Register::Gp,
        Register::Sp,
        Register::Fp,
        Register::Ra,
    ];

    /// The eight caller-saved temporaries `$t0..$t7`, the default scratch pool.
    pub const TEMPORARIES: [Register; 8] = [
        Register::T0,
        Register::T1,
        Register::T2,
        Register::T3,
        Register::T4,
        Register::T5,
        Register::T6,
        Register::T7,
    ];

    /// Returns the register with hardware number `number`.
    #[must_use]
    pub fn from_number(number: u8) -> Option<Register> {
        Self::ALL.get(usize::from(number)).copied()
    }

    /// Returns the hardware register number.
    #[must_use]
    #[inline]
    pub const fn number(self) -> u8 {
        self as u8
    }

    /// Returns the assembler name, e.g. `"$sp"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Returns `true` for `$sp`.
    #[must_use]
    #[inline]
    pub const fn is_stack_pointer(self) -> bool {
        matches!(self, Register::Sp)
    }

    /// Returns `true` for `$zero`, whose writes are discarded by the hardware.
    #[must_use]
    #[inline]
    pub const fn is_zero(self) -> bool {
        matches!(self, Register::Zero)
    }
}

/// One half of the multiply/divide accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum Accumulator {
    #[strum(serialize = "hi")]
    Hi,
    #[strum(serialize = "lo")]
    Lo,
}

/// A placeholder register introduced by inserted code.
///
/// Synthetic registers only exist between the transformation policy and the register
/// allocator; a block handed to relocation never contains one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyntheticReg(pub u32);

impl SyntheticReg {
    /// Returns the raw id of this synthetic register.
    #[must_use]
    #[inline]
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SyntheticReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%s{}", self.0)
    }
}

/// A register operand of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// A physical general-purpose register
    Reg(Register),
    /// An accumulator half
    Acc(Accumulator),
    /// A synthetic register awaiting allocation
    Synthetic(SyntheticReg),
}

impl Operand {
    /// Returns the physical register, if this operand names one.
    #[must_use]
    pub const fn as_register(&self) -> Option<Register> {
        match self {
            Operand::Reg(reg) => Some(*reg),
            _ => None,
        }
    }

    /// Returns the synthetic register, if this operand is one.
    #[must_use]
    pub const fn as_synthetic(&self) -> Option<SyntheticReg> {
        match self {
            Operand::Synthetic(reg) => Some(*reg),
            _ => None,
        }
    }

    /// Returns `true` if this operand is a synthetic register.
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        matches!(self, Operand::Synthetic(_))
    }
}

impl From<Register> for Operand {
    fn from(reg: Register) -> Self {
        Operand::Reg(reg)
    }
}

impl From<Accumulator> for Operand {
    fn from(acc: Accumulator) -> Self {
        Operand::Acc(acc)
    }
}

impl From<SyntheticReg> for Operand {
    fn from(reg: SyntheticReg) -> Self {
        Operand::Synthetic(reg)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Acc(acc) => write!(f, "{acc}"),
            Operand::Synthetic(reg) => write!(f, "{reg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::{EnumCount, IntoEnumIterator};

    use super::*;

    #[test]
    fn test_register_table_matches_numbers() {
        assert_eq!(Register::COUNT, 32);
        for (number, reg) in Register::iter().enumerate() {
            assert_eq!(usize::from(reg.number()), number);
            assert_eq!(Register::ALL[number], reg);
            assert_eq!(Register::from_number(reg.number()), Some(reg));
        }
        assert_eq!(Register::from_number(32), None);
    }

    #[test]
    fn test_register_names() {
        assert_eq!(Register::Sp.name(), "$sp");
        assert_eq!(Register::T9.to_string(), "$t9");
        assert_eq!(Register::from_str("$ra").unwrap(), Register::Ra);
        assert!(Register::from_str("$r99").is_err());
    }

    #[test]
    fn test_register_predicates() {
        assert!(Register::Sp.is_stack_pointer());
        assert!(!Register::Fp.is_stack_pointer());
        assert!(Register::Zero.is_zero());
    }

    #[test]
    fn test_operand_conversions() {
        let op: Operand = Register::T0.into();
        assert_eq!(op.as_register(), Some(Register::T0));
        assert!(!op.is_synthetic());

        let op: Operand = SyntheticReg(4).into();
        assert_eq!(op.as_synthetic(), Some(SyntheticReg(4)));
        assert_eq!(op.to_string(), "%s4");

        let op: Operand = Accumulator::Hi.into();
        assert_eq!(op.to_string(), "hi");
        assert_eq!(op.as_register(), None);
    }
}
