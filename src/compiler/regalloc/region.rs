//! Naive per-region allocation.
//!
//! A region is a maximal run of inserted (unplaced) instructions. Original instructions
//! bound regions and are never touched. Every synthetic register of a region gets its
//! own scratch register for the whole region, in order of first use; the borrowed
//! registers are saved before and restored after the region. There is no spilling: a
//! region needing more registers than the pool offers fails, and so does a region that
//! reads a synthetic register before writing it. Synthetic ids are scoped to their
//! region: the same id in two regions names two unrelated values.

use crate::{
    compiler::{
        regalloc::{
            frame::{rebase_stack_operands, terminator_index, Frame},
            AllocationReport,
        },
        TransformConfig,
    },
    isa::{Instruction, Operand, Register, Resource, SyntheticReg},
    Error, Result,
};

/// Allocates every region of `instructions`.
///
/// # Errors
///
/// Returns [`Error::RegisterPoolExhausted`] if a region needs more registers than the
/// pool offers after removing the registers the region names itself, and the frame
/// errors of [`rebase_stack_operands`].
pub(crate) fn allocate_regions(
    instructions: &[Instruction],
    config: &TransformConfig,
) -> Result<(Vec<Instruction>, AllocationReport)> {
    let terminator = terminator_index(instructions);
    let mut output = Vec::with_capacity(instructions.len());
    let mut report = AllocationReport::default();

    let mut pos = 0;
    while pos < instructions.len() {
        if instructions[pos].is_placed() {
            output.push(instructions[pos].clone());
            pos += 1;
            continue;
        }

        let end = instructions[pos..]
            .iter()
            .position(Instruction::is_placed)
            .map_or(instructions.len(), |len| pos + len);
        let region = &instructions[pos..end];

        if region.iter().any(Instruction::has_synthetic) {
            if terminator.is_some_and(|t| end > t) {
                return Err(malformed_error!(
                    "Region {}..{} overlaps the block's control transfer",
                    pos,
                    end
                ));
            }
            if let Some(reg) = live_in_synthetic(region) {
                return Err(malformed_error!(
                    "Synthetic register {} is read in region {}..{} before being written there",
                    reg,
                    pos,
                    end
                ));
            }
            let (code, region_report) = allocate_region(region, config)?;
            output.extend(code);
            report.absorb(region_report);
        } else {
            output.extend_from_slice(region);
        }
        pos = end;
    }

    Ok((output, report))
}

/// Returns a synthetic register the region reads before writing it.
///
/// Such a value would have to come from another region, which never shares registers.
fn live_in_synthetic(region: &[Instruction]) -> Option<SyntheticReg> {
    let mut defined: Vec<SyntheticReg> = Vec::new();
    for instr in region {
        for resource in instr.reads() {
            if let Resource::Synthetic(reg) = resource {
                if !defined.contains(&reg) {
                    return Some(reg);
                }
            }
        }
        for resource in instr.writes() {
            if let Resource::Synthetic(reg) = resource {
                defined.push(reg);
            }
        }
    }
    None
}

fn allocate_region(
    region: &[Instruction],
    config: &TransformConfig,
) -> Result<(Vec<Instruction>, AllocationReport)> {
    let mut synthetics: Vec<SyntheticReg> = Vec::new();
    for reg in region.iter().flat_map(Instruction::synthetic_registers) {
        if !synthetics.contains(&reg) {
            synthetics.push(reg);
        }
    }

    let named: Vec<Register> = region
        .iter()
        .flat_map(Instruction::physical_registers)
        .collect();
    let available: Vec<Register> = config
        .scratch_pool
        .iter()
        .copied()
        .filter(|reg| !named.contains(reg))
        .collect();

    if synthetics.len() > available.len() {
        return Err(Error::RegisterPoolExhausted {
            needed: synthetics.len(),
            available: available.len(),
        });
    }

    let borrowed = &available[..synthetics.len()];
    let frame = Frame {
        saved: borrowed.to_vec(),
        accumulator: region
            .iter()
            .any(Instruction::touches_accumulator)
            .then_some(config.accumulator_temp),
        spill_slots: 0,
    };

    let mut body = region.to_vec();
    rebase_stack_operands(&mut body, frame.bytes())?;
    for instr in &mut body {
        instr.map_operands(|op| match op {
            Operand::Synthetic(reg) => synthetics
                .iter()
                .position(|s| *s == reg)
                .map_or(op, |index| Operand::Reg(borrowed[index])),
            other => other,
        });
    }

    log::debug!(
        "Region of {} instructions: {} synthetic registers on {:?}",
        region.len(),
        synthetics.len(),
        borrowed
    );

    let mut code = frame.prologue();
    code.extend(body);
    code.extend(frame.epilogue());

    let report = AllocationReport {
        registers_used: borrowed.to_vec(),
        saved: frame.saved.len(),
        spilled: 0,
        frame_bytes: frame.bytes().unsigned_abs(),
        frames: 1,
    };
    Ok((code, report))
}
