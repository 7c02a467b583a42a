//! Helper functions and utilities for testing
//!
//! Builders for the programs, images and instruction sequences the unit tests share.
//! The canonical layout is the one used by the relocation tests:
//!
//! | Section   | Address    | Size | Contents                                    |
//! |-----------|------------|------|---------------------------------------------|
//! | `.text`   | `0x400000` | 64   | function `f` (entry + exit block) at `+8`   |
//! | `.data`   | `0x400040` | 64   | -                                           |
//! | (gap)     | `0x400080` | 64   | free                                        |
//! | `.rodata` | `0x4000c0` | 64   | -                                           |
//! | (free)    | `0x400100` | ...  | free up to the address limit                |

use crate::{
    isa::{Instruction, Opcode, Register, SyntheticReg},
    program::{BinaryImage, BlockId, Permissions, Program, Section, Symbol},
};

pub const TEXT_BASE: u64 = 0x400000;
pub const F_ENTRY: u64 = 0x400008;
pub const F_EXIT: u64 = 0x400020;

// Helper function to create the entry block of `f`: prologue, body, conditional branch
pub fn create_entry_instructions() -> Vec<Instruction> {
    vec![
        Instruction::addiu(Register::Sp, Register::Sp, -8).at(0x400008),
        Instruction::alu(Opcode::Addu, Register::V0, Register::A0, Register::A1).at(0x40000c),
        Instruction::lw(Register::T0, 0, Register::A0).at(0x400010),
        Instruction::alu(Opcode::Addu, Register::V0, Register::V0, Register::T0).at(0x400014),
        Instruction::branch(Opcode::Beq, Register::V0, Register::Zero, F_EXIT).at(0x400018),
        Instruction::nop().at(0x40001c),
    ]
}

// Helper function to create the exit block of `f`: epilogue and return
pub fn create_exit_instructions() -> Vec<Instruction> {
    vec![
        Instruction::addiu(Register::Sp, Register::Sp, 8).at(0x400020),
        Instruction::jr(Register::Ra).at(0x400024),
        Instruction::nop().at(0x400028),
    ]
}

// Helper function to create the two-block program with function `f`
pub fn create_program() -> (Program, BlockId, BlockId) {
    let mut program = Program::new();
    let f = program.add_function("f");
    let entry = program
        .add_block(f, F_ENTRY, create_entry_instructions())
        .unwrap();
    let exit = program
        .add_block(f, F_EXIT, create_exit_instructions())
        .unwrap();
    program.infer_edges().unwrap();
    (program, entry, exit)
}

// Helper function to create the image matching `create_program`
pub fn create_image() -> BinaryImage {
    let mut image = BinaryImage::default();
    image.add_section(Section::new(
        ".text",
        TEXT_BASE,
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

// Helper function to create `count` independent definitions of distinct synthetic registers,
// each followed by a store that reads it back
pub fn create_synthetic_run(count: u32) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    for id in 0..count {
        instructions.push(Instruction::addiu(
            SyntheticReg(id),
            Register::Zero,
            i64::from(id),
        ));
    }
    for id in 0..count {
        instructions.push(Instruction::sw(
            SyntheticReg(id),
            i64::from(id) * 4,
            Register::A0,
        ));
    }
    instructions
}

// Helper function to place decoded instructions at consecutive addresses
pub fn place(instructions: Vec<Instruction>, start: u64) -> Vec<Instruction> {
    instructions
        .into_iter()
        .enumerate()
        .map(|(i, instr)| instr.at(start + i as u64 * Instruction::SIZE))
        .collect()
}

// Helper function to create a minimal little-endian ELF32 file with `.text`, `.shstrtab`,
// `.symtab` and `.strtab`, holding one function symbol `f` at 0x400000
pub fn build_elf32(machine: u16) -> Vec<u8> {
    fn u16le(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_le_bytes());
    }
    fn u32le(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_le_bytes());
    }
    #[allow(clippy::too_many_arguments)]
    fn shdr(
        out: &mut Vec<u8>,
        name: u32,
        kind: u32,
        flags: u32,
        addr: u32,
        offset: u32,
        size: u32,
        link: u32,
        info: u32,
        align: u32,
        entsize: u32,
    ) {
        for v in [name, kind, flags, addr, offset, size, link, info, align, entsize] {
            u32le(out, v);
        }
    }

    let shstrtab = b"\0.text\0.shstrtab\0.symtab\0.strtab\0";
    let strtab = b"\0f\0";

    let text_off = 0x34u32;
    let shstrtab_off = text_off + 16;
    let strtab_off = 0x68u32;
    let symtab_off = 0x6cu32;
    let shoff = symtab_off + 32;

    let mut out = Vec::new();
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0]);
    out.extend_from_slice(&[0; 8]);
    u16le(&mut out, 2); // ET_EXEC
    u16le(&mut out, machine);
    u32le(&mut out, 1);
    u32le(&mut out, 0x400000);
    u32le(&mut out, 0);
    u32le(&mut out, shoff);
    u32le(&mut out, 0);
    u16le(&mut out, 52);
    u16le(&mut out, 32);
    u16le(&mut out, 0);
    u16le(&mut out, 40);
    u16le(&mut out, 5);
    u16le(&mut out, 2);

    out.extend_from_slice(&[0; 16]);
    out.extend_from_slice(shstrtab);
    out.resize(strtab_off as usize, 0);
    out.extend_from_slice(strtab);
    out.resize(symtab_off as usize, 0);

    out.extend_from_slice(&[0; 16]);
    u32le(&mut out, 1);
    u32le(&mut out, 0x400000);
    u32le(&mut out, 16);
    out.push(0x12); // STB_GLOBAL | STT_FUNC
    out.push(0);
    u16le(&mut out, 1);

    shdr(&mut out, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0);
    shdr(&mut out, 1, 1, 0x6, 0x400000, text_off, 16, 0, 0, 4, 0);
    shdr(
        &mut out,
        7,
        3,
        0,
        0,
        shstrtab_off,
        shstrtab.len() as u32,
        0,
        0,
        1,
        0,
    );
    shdr(&mut out, 17, 2, 0, 0, symtab_off, 32, 4, 1, 4, 16);
    shdr(&mut out, 25, 3, 0, 0, strtab_off, strtab.len() as u32, 0, 0, 1, 0);
    out
}
