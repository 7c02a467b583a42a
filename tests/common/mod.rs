//! Shared fixtures for the integration tests.
//!
//! The layout mirrors a small MIPS executable: `.text` holds function `f` at
//! `0x400008`, followed by `.data`, a 64-byte hole and `.rodata`.

#![allow(dead_code)]

use mipsweave::prelude::*;

pub const F_ENTRY: u64 = 0x400008;
pub const F_EXIT: u64 = 0x400020;

pub fn program() -> (Program, BlockId, BlockId) {
    let mut program = Program::new();
    let f = program.add_function("f");
    let entry = program
        .add_block(
            f,
            F_ENTRY,
            vec![
                Instruction::addiu(Register::Sp, Register::Sp, -8).at(0x400008),
                Instruction::alu(Opcode::Addu, Register::V0, Register::A0, Register::A1)
                    .at(0x40000c),
                Instruction::lw(Register::T0, 0, Register::A0).at(0x400010),
                Instruction::alu(Opcode::Addu, Register::V0, Register::V0, Register::T0)
                    .at(0x400014),
                Instruction::branch(Opcode::Beq, Register::V0, Register::Zero, F_EXIT)
                    .at(0x400018),
                Instruction::nop().at(0x40001c),
            ],
        )
        .unwrap();
    let exit = program
        .add_block(
            f,
            F_EXIT,
            vec![
                Instruction::addiu(Register::Sp, Register::Sp, 8).at(0x400020),
                Instruction::jr(Register::Ra).at(0x400024),
                Instruction::nop().at(0x400028),
            ],
        )
        .unwrap();
    program.infer_edges().unwrap();
    (program, entry, exit)
}

pub fn image() -> BinaryImage {
    let mut image = BinaryImage::default();
    image.add_section(Section::new(
        ".text",
        0x400000,
        0x40,
        0x1000,
        16,
        Permissions::READ | Permissions::EXECUTE,
    ));
    image.add_section(Section::new(
        ".data",
        0x400040,
        0x40,
        0x1040,
        16,
        Permissions::READ | Permissions::WRITE,
    ));
    image.add_section(Section::new(
        ".rodata",
        0x4000c0,
        0x40,
        0x1080,
        16,
        Permissions::READ,
    ));
    image.symbols.push(Symbol::function("f", F_ENTRY, 36));
    image
}

/// Inserts `count` definitions of distinct synthetic registers after every `lw`,
/// followed by one store per register, so all of them are live at once.
pub fn pressure_policy(count: u32) -> impl TransformPolicy {
    FnPolicy::new(move |instr: &Instruction| {
        if instr.opcode != Opcode::Lw {
            return vec![instr.clone()];
        }
        let mut out = vec![instr.clone()];
        for id in 0..count {
            out.push(Instruction::addiu(
                SyntheticReg(id),
                Register::Zero,
                i64::from(id),
            ));
        }
        for id in 0..count {
            out.push(Instruction::sw(
                SyntheticReg(id),
                i64::from(id) * 4,
                Register::A1,
            ));
        }
        out
    })
}
