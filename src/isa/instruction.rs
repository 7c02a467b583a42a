//! Decoded MIPS instructions.
//!
//! An [`Instruction`] is the unit every pipeline stage works on. It carries its operands
//! in a normalized shape, independent of the encoding:
//!
//! | Class            | `dests`   | `sources`        | `immediate`               |
//! |------------------|-----------|------------------|---------------------------|
//! | ALU (R)          | `[rd]`    | `[rs, rt]`       | -                         |
//! | ALU (I)          | `[rt]`    | `[rs]`           | 16-bit constant           |
//! | `lui`            | `[rt]`    | `[]`             | 16-bit constant           |
//! | shift            | `[rd]`    | `[rt]` / `[rt, rs]` | 5-bit amount (immediate form) |
//! | load             | `[rt]`    | `[base]`         | 16-bit offset             |
//! | store            | `[]`      | `[rt, base]`     | 16-bit offset             |
//! | mult/div         | `[]`      | `[rs, rt]`       | -                         |
//! | `mfhi`/`mflo`    | `[rd]`    | `[]`             | -                         |
//! | `mthi`/`mtlo`    | `[]`      | `[rs]`           | -                         |
//! | branch           | `[]`      | `[rs]` / `[rs, rt]` | absolute target        |
//! | `j`/`jal`        | `[]`      | `[]`             | absolute target           |
//! | `jr` / `jalr`    | `[]`/`[rd]` | `[rs]`         | -                         |
//!
//! Implicit effects (accumulator halves, `$ra`, memory) are not listed as operands; they
//! are derived from the opcode class by [`Instruction::writes`] and [`Instruction::reads`].
//!
//! # Addresses
//!
//! `address` is the current placement, where 0 means "not placed yet" (inserted code).
//! `origin` is the address the instruction was decoded from and never changes; inserted
//! instructions have an `origin` of 0.

use std::fmt;

use crate::isa::{
    Accumulator, Format, MemWidth, OpClass, Opcode, Operand, Register, Resource, SyntheticReg,
};

/// A constant operand together with the width of its encoding field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Immediate {
    /// The constant value (sign-extended where the opcode sign-extends)
    pub value: i64,
    /// Width of the encoding field in bits
    pub bits: u8,
}

impl Immediate {
    /// Creates a new immediate.
    #[must_use]
    pub const fn new(value: i64, bits: u8) -> Self {
        Immediate { value, bits }
    }

    /// Returns `true` if `value` is representable as a signed `bits`-wide field.
    #[must_use]
    pub const fn fits_signed(value: i64, bits: u8) -> bool {
        let half = 1i64 << (bits - 1);
        value >= -half && value < half
    }
}

/// A single MIPS instruction with normalized operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// The operation
    pub opcode: Opcode,
    /// Encoding format
    pub format: Format,
    /// Explicit destination operands
    pub dests: Vec<Operand>,
    /// Explicit source operands, in encoding order
    pub sources: Vec<Operand>,
    /// Constant, offset or absolute target
    pub immediate: Option<Immediate>,
    /// Width of the memory access for loads and stores
    pub mem_width: Option<MemWidth>,
    /// Current address, 0 while not placed
    pub address: u64,
    /// Address the instruction was decoded from, 0 for inserted code
    pub origin: u64,
    /// `false` for instructions that must neither be moved nor rewritten
    pub transformable: bool,
}

impl Instruction {
    /// Size of every MIPS32 instruction in bytes.
    pub const SIZE: u64 = 4;

    /// Creates an instruction without operands.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Instruction {
            opcode,
            format: opcode.format(),
            dests: Vec::new(),
            sources: Vec::new(),
            immediate: None,
            mem_width: opcode.memory_width(),
            address: 0,
            origin: 0,
            transformable: true,
        }
    }

    /// Adds a destination operand.
    #[must_use]
    pub fn dest(mut self, operand: impl Into<Operand>) -> Self {
        self.dests.push(operand.into());
        self
    }

    /// Adds a source operand.
    #[must_use]
    pub fn source(mut self, operand: impl Into<Operand>) -> Self {
        self.sources.push(operand.into());
        self
    }

    /// Sets the immediate operand.
    #[must_use]
    pub fn imm(mut self, value: i64, bits: u8) -> Self {
        self.immediate = Some(Immediate::new(value, bits));
        self
    }

    /// Places the instruction at `address` and records it as its origin.
    ///
    /// Used for instructions that come out of the decoder.
    #[must_use]
    pub fn at(mut self, address: u64) -> Self {
        self.address = address;
        self.origin = address;
        self
    }

    /// Three-register ALU operation, e.g. `addu rd, rs, rt`.
    #[must_use]
    pub fn alu(
        opcode: Opcode,
        rd: impl Into<Operand>,
        rs: impl Into<Operand>,
        rt: impl Into<Operand>,
    ) -> Self {
        Self::new(opcode).dest(rd).source(rs).source(rt)
    }

    /// Register-immediate ALU operation, e.g. `ori rt, rs, imm`.
    #[must_use]
    pub fn alu_imm(
        opcode: Opcode,
        rt: impl Into<Operand>,
        rs: impl Into<Operand>,
        imm: i64,
    ) -> Self {
        Self::new(opcode).dest(rt).source(rs).imm(imm, 16)
    }

    /// `addiu rt, rs, imm`
    #[must_use]
    pub fn addiu(rt: impl Into<Operand>, rs: impl Into<Operand>, imm: i64) -> Self {
        Self::alu_imm(Opcode::Addiu, rt, rs, imm)
    }

    /// `lui rt, imm`
    #[must_use]
    pub fn lui(rt: impl Into<Operand>, imm: i64) -> Self {
        Self::new(Opcode::Lui).dest(rt).imm(imm, 16)
    }

    /// Shift by immediate, e.g. `sll rd, rt, shamt`.
    #[must_use]
    pub fn shift(
        opcode: Opcode,
        rd: impl Into<Operand>,
        rt: impl Into<Operand>,
        shamt: u8,
    ) -> Self {
        Self::new(opcode)
            .dest(rd)
            .source(rt)
            .imm(i64::from(shamt), 5)
    }

    /// Load of the width implied by `opcode`, e.g. `lw rt, offset(base)`.
    #[must_use]
    pub fn load(
        opcode: Opcode,
        rt: impl Into<Operand>,
        offset: i64,
        base: impl Into<Operand>,
    ) -> Self {
        Self::new(opcode).dest(rt).source(base).imm(offset, 16)
    }

    /// Store of the width implied by `opcode`, e.g. `sw rt, offset(base)`.
    #[must_use]
    pub fn store(
        opcode: Opcode,
        rt: impl Into<Operand>,
        offset: i64,
        base: impl Into<Operand>,
    ) -> Self {
        Self::new(opcode).source(rt).source(base).imm(offset, 16)
    }

    /// `lw rt, offset(base)`
    #[must_use]
    pub fn lw(rt: impl Into<Operand>, offset: i64, base: impl Into<Operand>) -> Self {
        Self::load(Opcode::Lw, rt, offset, base)
    }

    /// `sw rt, offset(base)`
    #[must_use]
    pub fn sw(rt: impl Into<Operand>, offset: i64, base: impl Into<Operand>) -> Self {
        Self::store(Opcode::Sw, rt, offset, base)
    }

    /// Multiply or divide, e.g. `mult rs, rt`.
    #[must_use]
    pub fn mul_div(opcode: Opcode, rs: impl Into<Operand>, rt: impl Into<Operand>) -> Self {
        Self::new(opcode).source(rs).source(rt)
    }

    /// `mfhi rd`
    #[must_use]
    pub fn mfhi(rd: impl Into<Operand>) -> Self {
        Self::new(Opcode::Mfhi).dest(rd)
    }

    /// `mflo rd`
    #[must_use]
    pub fn mflo(rd: impl Into<Operand>) -> Self {
        Self::new(Opcode::Mflo).dest(rd)
    }

    /// `mthi rs`
    #[must_use]
    pub fn mthi(rs: impl Into<Operand>) -> Self {
        Self::new(Opcode::Mthi).source(rs)
    }

    /// `mtlo rs`
    #[must_use]
    pub fn mtlo(rs: impl Into<Operand>) -> Self {
        Self::new(Opcode::Mtlo).source(rs)
    }

    /// Two-register conditional branch (`beq`, `bne`) to an absolute target.
    #[must_use]
    pub fn branch(
        opcode: Opcode,
        rs: impl Into<Operand>,
        rt: impl Into<Operand>,
        target: u64,
    ) -> Self {
        Self::new(opcode)
            .source(rs)
            .source(rt)
            .imm(target_value(target), 16)
    }

    /// Compare-with-zero branch (`blez`, `bgtz`, `bltz`, `bgez`) to an absolute target.
    #[must_use]
    pub fn branch_zero(opcode: Opcode, rs: impl Into<Operand>, target: u64) -> Self {
        Self::new(opcode).source(rs).imm(target_value(target), 16)
    }

    /// `j target`
    #[must_use]
    pub fn jump(target: u64) -> Self {
        Self::new(Opcode::J).imm(target_value(target), 26)
    }

    /// `jal target`
    #[must_use]
    pub fn jal(target: u64) -> Self {
        Self::new(Opcode::Jal).imm(target_value(target), 26)
    }

    /// `jr rs`
    #[must_use]
    pub fn jr(rs: impl Into<Operand>) -> Self {
        Self::new(Opcode::Jr).source(rs)
    }

    /// `jalr rd, rs`
    #[must_use]
    pub fn jalr(rd: impl Into<Operand>, rs: impl Into<Operand>) -> Self {
        Self::new(Opcode::Jalr).dest(rd).source(rs)
    }

    /// `nop`
    #[must_use]
    pub fn nop() -> Self {
        Self::new(Opcode::Nop)
    }

    /// Returns the behavioral class of the opcode.
    #[must_use]
    pub const fn class(&self) -> OpClass {
        self.opcode.class()
    }

    /// Returns the assembler mnemonic.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.opcode.mnemonic()
    }

    /// Returns `true` once the instruction has an address.
    #[must_use]
    pub const fn is_placed(&self) -> bool {
        self.address != 0
    }

    /// Returns `true` if the instruction was decoded from the input binary.
    #[must_use]
    pub const fn is_original(&self) -> bool {
        self.origin != 0
    }

    /// Returns the absolute target of a branch, `j` or `jal`.
    #[must_use]
    pub fn branch_target(&self) -> Option<u64> {
        if !self.opcode.has_static_target() {
            return None;
        }
        self.immediate.and_then(|imm| u64::try_from(imm.value).ok())
    }

    /// Rewrites the absolute target of a branch, `j` or `jal`.
    ///
    /// Returns `false` if the instruction has no static target.
    pub fn set_branch_target(&mut self, target: u64) -> bool {
        if !self.opcode.has_static_target() {
            return false;
        }
        match self.immediate.as_mut() {
            Some(imm) => {
                imm.value = target_value(target);
                true
            }
            None => false,
        }
    }

    /// Returns the base register operand of a load or store.
    #[must_use]
    pub fn base_register(&self) -> Option<&Operand> {
        match self.class() {
            OpClass::Load | OpClass::Store => self.sources.last(),
            _ => None,
        }
    }

    /// Returns the immediate of `addiu/addi $sp, $sp, imm`, the stack-pointer adjustment.
    #[must_use]
    pub fn stack_adjustment(&self) -> Option<i64> {
        if !matches!(self.opcode, Opcode::Addiu | Opcode::Addi) {
            return None;
        }
        let sp = Operand::Reg(Register::Sp);
        if self.dests.first() == Some(&sp) && self.sources.first() == Some(&sp) {
            self.immediate.map(|imm| imm.value)
        } else {
            None
        }
    }

    /// Returns `true` if `reg` is written, explicitly or implicitly.
    #[must_use]
    pub fn writes_register(&self, reg: Register) -> bool {
        self.writes().contains(&Resource::Gpr(reg))
    }

    /// Returns `true` if the instruction reads or writes `hi` or `lo`.
    #[must_use]
    pub fn touches_accumulator(&self) -> bool {
        matches!(
            self.class(),
            OpClass::MulDiv | OpClass::MoveFromAcc | OpClass::MoveToAcc
        ) || self.operands().any(|op| matches!(op, Operand::Acc(_)))
    }

    /// Returns all explicit operands, destinations first.
    pub fn operands(&self) -> impl Iterator<Item = &Operand> + '_ {
        self.dests.iter().chain(self.sources.iter())
    }

    /// Returns the physical registers named by explicit operands.
    pub fn physical_registers(&self) -> impl Iterator<Item = Register> + '_ {
        self.operands().filter_map(Operand::as_register)
    }

    /// Returns the synthetic registers named by explicit operands.
    pub fn synthetic_registers(&self) -> impl Iterator<Item = SyntheticReg> + '_ {
        self.operands().filter_map(Operand::as_synthetic)
    }

    /// Returns `true` if any operand is a synthetic register.
    #[must_use]
    pub fn has_synthetic(&self) -> bool {
        self.operands().any(Operand::is_synthetic)
    }

    /// Returns `true` if `reg` is a destination.
    #[must_use]
    pub fn defines_synthetic(&self, reg: SyntheticReg) -> bool {
        self.dests.contains(&Operand::Synthetic(reg))
    }

    /// Returns `true` if `reg` is a source.
    #[must_use]
    pub fn uses_synthetic(&self, reg: SyntheticReg) -> bool {
        self.sources.contains(&Operand::Synthetic(reg))
    }

    /// Applies `map` to every explicit operand.
    pub fn map_operands(&mut self, mut map: impl FnMut(Operand) -> Operand) {
        for op in self.dests.iter_mut().chain(self.sources.iter_mut()) {
            *op = map(*op);
        }
    }

    /// Returns the resources this instruction writes.
    ///
    /// Explicit destinations plus the implicit effects of the opcode class: both
    /// accumulator halves for multiply/divide, one half for `mthi`/`mtlo`, `$ra` for
    /// `jal` and memory for stores. Writes to `$zero` are discarded by the hardware and
    /// never reported.
    #[must_use]
    pub fn writes(&self) -> Vec<Resource> {
        let mut resources: Vec<Resource> = self.dests.iter().filter_map(resource_of).collect();
        match self.opcode {
            Opcode::Mult | Opcode::Multu | Opcode::Div | Opcode::Divu => {
                resources.push(Resource::Acc(Accumulator::Hi));
                resources.push(Resource::Acc(Accumulator::Lo));
            }
            Opcode::Mthi => resources.push(Resource::Acc(Accumulator::Hi)),
            Opcode::Mtlo => resources.push(Resource::Acc(Accumulator::Lo)),
            Opcode::Jal => resources.push(Resource::Gpr(Register::Ra)),
            Opcode::Sb | Opcode::Sh | Opcode::Sw => resources.push(Resource::Memory),
            _ => {}
        }
        dedup(resources)
    }

    /// Returns the resources this instruction reads.
    ///
    /// Explicit sources plus `hi`/`lo` for `mfhi`/`mflo` and memory for loads.
    #[must_use]
    pub fn reads(&self) -> Vec<Resource> {
        let mut resources: Vec<Resource> = self.sources.iter().filter_map(resource_of).collect();
        match self.opcode {
            Opcode::Mfhi => resources.push(Resource::Acc(Accumulator::Hi)),
            Opcode::Mflo => resources.push(Resource::Acc(Accumulator::Lo)),
            Opcode::Lb | Opcode::Lbu | Opcode::Lh | Opcode::Lhu | Opcode::Lw => {
                resources.push(Resource::Memory);
            }
            _ => {}
        }
        dedup(resources)
    }
}

fn target_value(target: u64) -> i64 {
    i64::try_from(target).unwrap_or(i64::MAX)
}

fn resource_of(operand: &Operand) -> Option<Resource> {
    match operand {
        Operand::Reg(reg) if reg.is_zero() => None,
        Operand::Reg(reg) => Some(Resource::Gpr(*reg)),
        Operand::Acc(acc) => Some(Resource::Acc(*acc)),
        Operand::Synthetic(reg) => Some(Resource::Synthetic(*reg)),
    }
}

fn dedup(mut resources: Vec<Resource>) -> Vec<Resource> {
    let mut seen = Vec::with_capacity(resources.len());
    resources.retain(|res| {
        if seen.contains(res) {
            false
        } else {
            seen.push(*res);
            true
        }
    });
    resources
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())?;

        let offset = self.immediate.map_or(0, |imm| imm.value);
        match self.class() {
            OpClass::Load | OpClass::Store => {
                let value = match self.class() {
                    OpClass::Load => self.dests.first(),
                    _ => self.sources.first(),
                };
                if let (Some(value), Some(base)) = (value, self.base_register()) {
                    write!(f, " {value}, {offset}({base})")?;
                }
                Ok(())
            }
            OpClass::Branch | OpClass::Jump | OpClass::Call => {
                let mut sep = " ";
                for op in &self.sources {
                    write!(f, "{sep}{op}")?;
                    sep = ", ";
                }
                if let Some(target) = self.branch_target() {
                    write!(f, "{sep}0x{target:08x}")?;
                }
                Ok(())
            }
            _ => {
                let mut sep = " ";
                for op in self.operands() {
                    write!(f, "{sep}{op}")?;
                    sep = ", ";
                }
                if let Some(imm) = self.immediate {
                    write!(f, "{sep}{}", imm.value)?;
                }
                Ok(())
            }
        }
    }
}
