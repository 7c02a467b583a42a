//! MIPS32 opcodes handled by the rewriting pipeline.
//!
//! Every [`Opcode`] knows its assembler mnemonic, its encoding [`Format`] and its
//! [`OpClass`]. The class is what the rest of the crate dispatches on: hazard
//! extraction selects implicit resources by class, the scheduler pins control
//! transfers by class, and relocation only retargets classes with a static target.

use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// Encoding format of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Format {
    /// Register format: `op rs rt rd shamt funct`
    R,
    /// Immediate format: `op rs rt imm16`
    I,
    /// Jump format: `op target26`
    J,
}

/// Width of a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum MemWidth {
    Byte,
    Half,
    Word,
}

impl MemWidth {
    /// Returns the access size in bytes.
    #[must_use]
    pub const fn bytes(self) -> u8 {
        match self {
            MemWidth::Byte => 1,
            MemWidth::Half => 2,
            MemWidth::Word => 4,
        }
    }
}

/// Behavioral class of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum OpClass {
    /// Register or immediate arithmetic/logic
    Alu,
    /// Shift by immediate or by register
    Shift,
    /// Memory load
    Load,
    /// Memory store
    Store,
    /// Multiply or divide, writes both accumulator halves
    MulDiv,
    /// `mfhi`/`mflo`
    MoveFromAcc,
    /// `mthi`/`mtlo`
    MoveToAcc,
    /// Conditional PC-relative branch
    Branch,
    /// Unconditional region jump
    Jump,
    /// Region jump that links `$ra`
    Call,
    /// Jump through a register (`jr`, `jalr`)
    JumpRegister,
    /// `syscall` / `break`
    System,
    /// No operation
    Nop,
}

/// A supported MIPS32 instruction.
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
#[strum(serialize_all = "lowercase")]
pub enum Opcode {
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    Addi,
    Addiu,
    Andi,
    Ori,
    Xori,
    Slti,
    Sltiu,
    Lui,
    Mult,
    Multu,
    Div,
    Divu,
    Mfhi,
    Mflo,
    Mthi,
    Mtlo,
    Lb,
    Lbu,
    Lh,
    Lhu,
    Lw,
    Sb,
    Sh,
    Sw,
    Beq,
    Bne,
    Blez,
    Bgtz,
    Bltz,
    Bgez,
    J,
    Jal,
    Jr,
    Jalr,
    Syscall,
    Break,
    Nop,
}

impl Opcode {
    /// Returns the assembler mnemonic.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Returns the behavioral class.
    #[must_use]
    pub const fn class(self) -> OpClass {
        match self {
            Opcode::Add
            | Opcode::Addu
            | Opcode::Sub
            | Opcode::Subu
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Nor
            | Opcode::Slt
            | Opcode::Sltu
            | Opcode::Addi
            | Opcode::Addiu
            | Opcode::Andi
            | Opcode::Ori
            | Opcode::Xori
            | Opcode::Slti
            | Opcode::Sltiu
            | Opcode::Lui => OpClass::Alu,
            Opcode::Sll | Opcode::Srl | Opcode::Sra | Opcode::Sllv | Opcode::Srlv | Opcode::Srav => {
                OpClass::Shift
            }
            Opcode::Mult | Opcode::Multu | Opcode::Div | Opcode::Divu => OpClass::MulDiv,
            Opcode::Mfhi | Opcode::Mflo => OpClass::MoveFromAcc,
            Opcode::Mthi | Opcode::Mtlo => OpClass::MoveToAcc,
            Opcode::Lb | Opcode::Lbu | Opcode::Lh | Opcode::Lhu | Opcode::Lw => OpClass::Load,
            Opcode::Sb | Opcode::Sh | Opcode::Sw => OpClass::Store,
            Opcode::Beq | Opcode::Bne | Opcode::Blez | Opcode::Bgtz | Opcode::Bltz | Opcode::Bgez => {
                OpClass::Branch
            }
            Opcode::J => OpClass::Jump,
            Opcode::Jal => OpClass::Call,
            Opcode::Jr | Opcode::Jalr => OpClass::JumpRegister,
            Opcode::Syscall | Opcode::Break => OpClass::System,
            Opcode::Nop => OpClass::Nop,
        }
    }

    /// Returns the encoding format.
    #[must_use]
    pub const fn format(self) -> Format {
        match self.class() {
            OpClass::Jump | OpClass::Call => Format::J,
            OpClass::Load | OpClass::Store | OpClass::Branch => Format::I,
            _ => match self {
                Opcode::Addi
                | Opcode::Addiu
                | Opcode::Andi
                | Opcode::Ori
                | Opcode::Xori
                | Opcode::Slti
                | Opcode::Sltiu
                | Opcode::Lui => Format::I,
                _ => Format::R,
            },
        }
    }

    /// Returns the width of the memory access, for loads and stores.
    #[must_use]
    pub const fn memory_width(self) -> Option<MemWidth> {
        match self {
            Opcode::Lb | Opcode::Lbu | Opcode::Sb => Some(MemWidth::Byte),
            Opcode::Lh | Opcode::Lhu | Opcode::Sh => Some(MemWidth::Half),
            Opcode::Lw | Opcode::Sw => Some(MemWidth::Word),
            _ => None,
        }
    }

    /// Returns `true` if the instruction redirects control flow.
    ///
    /// `syscall` and `break` count as control transfers: both trap and must stay at
    /// their position relative to every other instruction of the block.
    #[must_use]
    pub const fn is_control_transfer(self) -> bool {
        matches!(
            self.class(),
            OpClass::Branch | OpClass::Jump | OpClass::Call | OpClass::JumpRegister | OpClass::System
        )
    }

    /// Returns `true` if the instruction encodes a static target address.
    #[must_use]
    pub const fn has_static_target(self) -> bool {
        matches!(self.class(), OpClass::Branch | OpClass::Jump | OpClass::Call)
    }

    /// Returns `true` if a delay slot follows the instruction.
    #[must_use]
    pub const fn has_delay_slot(self) -> bool {
        matches!(
            self.class(),
            OpClass::Branch | OpClass::Jump | OpClass::Call | OpClass::JumpRegister
        )
    }

    /// Returns `true` if the immediate operand is sign-extended.
    #[must_use]
    pub const fn sign_extends_immediate(self) -> bool {
        !matches!(self, Opcode::Andi | Opcode::Ori | Opcode::Xori | Opcode::Lui)
    }
}
