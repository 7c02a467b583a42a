//! Linear-scan allocation of a whole block.
//!
//! The block's synthetic registers get live intervals over the scheduled instruction
//! order and are assigned by [`linear_scan`]. A single frame spans from the first
//! interval start to the last interval end; it saves every handed-out register (and the
//! spill temporaries once anything spills) and holds the spill slots. Accesses to a
//! spilled register are rewritten to go through a spill temporary: sources are reloaded
//! right before the instruction, a destination is stored right after it.

use rustc_hash::FxHashSet;

use crate::{
    compiler::{
        regalloc::{
            frame::{rebase_stack_operands, terminator_index, Frame},
            interval::{compute_intervals, linear_scan, Location, ScanResult},
            AllocationReport,
        },
        TransformConfig,
    },
    isa::{Instruction, Operand, Register, SyntheticReg},
    Error, Result,
};

/// Allocates the synthetic registers of `instructions` by linear scan.
///
/// # Errors
///
/// - [`Error::RegisterPoolExhausted`] if spilling is needed while a spill temporary is
///   named by the block itself
/// - [`Error::StackPointerClobbered`] if an instruction inside the frame writes `$sp`
/// - [`Error::Malformed`] if the frame reaches the block's control transfer, if inserted
///   and original code both use the accumulator inside the frame, or if an instruction
///   reads more spilled registers than there are spill temporaries
pub(crate) fn allocate_intervals(
    instructions: &[Instruction],
    config: &TransformConfig,
) -> Result<(Vec<Instruction>, AllocationReport)> {
    let intervals = compute_intervals(instructions);
    let (Some(first), Some(last)) = (
        intervals.iter().map(|i| i.start).min(),
        intervals.iter().map(|i| i.end).max(),
    ) else {
        return Ok((instructions.to_vec(), AllocationReport::default()));
    };

    if terminator_index(instructions).is_some_and(|t| last >= t) {
        return Err(malformed_error!(
            "Synthetic registers live up to the control transfer of the block (index {})",
            last
        ));
    }

    let named: FxHashSet<Register> = instructions
        .iter()
        .flat_map(Instruction::physical_registers)
        .collect();
    let pool: Vec<Register> = config
        .scratch_pool
        .iter()
        .copied()
        .filter(|reg| !named.contains(reg))
        .collect();

    let scan = linear_scan(&intervals, &pool);
    let registers = scan.registers(&pool);

    let mut saved = registers.clone();
    if scan.slots > 0 {
        if config.spill_temporaries.iter().any(|t| named.contains(t)) {
            return Err(Error::RegisterPoolExhausted {
                needed: intervals.len(),
                available: pool.len(),
            });
        }
        saved.extend_from_slice(&config.spill_temporaries);
    }

    let body = &instructions[first..=last];
    let inserted_acc = body
        .iter()
        .any(|i| !i.is_original() && i.touches_accumulator());
    let original_acc = body
        .iter()
        .any(|i| i.is_original() && i.touches_accumulator());
    if inserted_acc && original_acc {
        return Err(malformed_error!(
            "Inserted and original code share hi/lo inside the allocation frame"
        ));
    }

    let frame = Frame {
        saved,
        accumulator: inserted_acc.then_some(config.accumulator_temp),
        spill_slots: scan.slots,
    };

    let mut rebased = body.to_vec();
    rebase_stack_operands(&mut rebased, frame.bytes())?;

    let mut output = Vec::with_capacity(instructions.len() + frame.words() as usize * 2);
    output.extend_from_slice(&instructions[..first]);
    output.extend(frame.prologue());
    for instr in rebased {
        rewrite(instr, &scan, &frame, config, &mut output)?;
    }
    output.extend(frame.epilogue());
    output.extend_from_slice(&instructions[last + 1..]);

    let report = AllocationReport {
        registers_used: registers,
        saved: frame.saved.len(),
        spilled: scan.spilled(),
        frame_bytes: frame.bytes().unsigned_abs(),
        frames: 1,
    };
    log::debug!(
        "Linear scan: {} intervals, {} registers, {} spilled, frame of {} bytes",
        intervals.len(),
        report.registers_used.len(),
        report.spilled,
        report.frame_bytes
    );
    Ok((output, report))
}

/// Emits `instr` with physical operands, surrounded by reloads and stores of spilled
/// registers.
fn rewrite(
    mut instr: Instruction,
    scan: &ScanResult,
    frame: &Frame,
    config: &TransformConfig,
    output: &mut Vec<Instruction>,
) -> Result<()> {
    let location = |reg: SyntheticReg| {
        scan.assignment
            .get(&reg)
            .copied()
            .ok_or_else(|| malformed_error!("Synthetic register {} has no location", reg))
    };

    // Spilled registers and the temporary carrying each
    let mut carried: Vec<(SyntheticReg, Register)> = Vec::new();

    for op in &instr.sources {
        if let Operand::Synthetic(reg) = *op {
            if let Location::Slot(slot) = location(reg)? {
                if carried.iter().any(|(r, _)| *r == reg) {
                    continue;
                }
                let Some(&temp) = config.spill_temporaries.get(carried.len()) else {
                    return Err(malformed_error!(
                        "'{}' reads more spilled registers than spill temporaries exist",
                        instr
                    ));
                };
                output.push(Instruction::lw(temp, frame.slot_offset(slot), Register::Sp));
                carried.push((reg, temp));
            }
        }
    }

    let mut stores = Vec::new();
    for op in &instr.dests {
        if let Operand::Synthetic(reg) = *op {
            if let Location::Slot(slot) = location(reg)? {
                let temp = match carried.iter().find(|(r, _)| *r == reg) {
                    Some((_, temp)) => *temp,
                    None => {
                        let temp = config.spill_temporaries[0];
                        carried.push((reg, temp));
                        temp
                    }
                };
                stores.push(Instruction::sw(temp, frame.slot_offset(slot), Register::Sp));
            }
        }
    }

    let mut missing = None;
    instr.map_operands(|op| match op {
        Operand::Synthetic(reg) => match scan.assignment.get(&reg) {
            Some(Location::Register(phys)) => Operand::Reg(*phys),
            Some(Location::Slot(_)) => carried
                .iter()
                .find(|(r, _)| *r == reg)
                .map_or(op, |(_, temp)| Operand::Reg(*temp)),
            None => {
                missing = Some(reg);
                op
            }
        },
        other => other,
    });
    if let Some(reg) = missing {
        return Err(malformed_error!("Synthetic register {} has no location", reg));
    }

    output.push(instr);
    output.extend(stores);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        isa::{Opcode, Register},
        test::{create_synthetic_run, place},
    };

    fn allocate(
        instructions: &[Instruction],
        pool: &[Register],
    ) -> Result<(Vec<Instruction>, AllocationReport)> {
        let config = TransformConfig::linear_scan().with_pool(pool.iter().copied());
        allocate_intervals(instructions, &config)
    }

    #[test]
    fn test_no_synthetics() -> Result<()> {
        let block = place(vec![Instruction::nop(), Instruction::nop()], 0x400000);
        let (code, report) = allocate(&block, &Register::TEMPORARIES)?;
        assert_eq!(code, block);
        assert!(report.is_empty());
        Ok(())
    }

    #[test]
    fn test_fits_in_pool() -> Result<()> {
        let run = create_synthetic_run(4);
        let (code, report) = allocate(&run, &Register::TEMPORARIES)?;

        assert_eq!(report.spilled, 0);
        assert_eq!(report.registers_used.len(), 4);
        assert_eq!(report.saved, 4);
        assert_eq!(report.frame_bytes, 16);
        assert!(code.iter().all(|i| !i.has_synthetic()));
        assert_eq!(code.len(), run.len() + 2 * 5);
        Ok(())
    }

    #[test]
    fn test_more_intervals_than_pool_spill() -> Result<()> {
        let run = create_synthetic_run(5);
        let pool = [Register::T0, Register::T1, Register::T2];
        let (code, report) = allocate(&run, &pool)?;

        assert!(report.spilled >= 1);
        assert_eq!(report.spilled, 2);
        // Three pool registers plus both spill temporaries.
        assert_eq!(report.saved, 5);
        assert_eq!(report.frame_bytes, 28);
        assert!(code.iter().all(|i| !i.has_synthetic()));

        // Spilled %s3 is defined into $t8 and stored to its slot right away.
        let def = code
            .iter()
            .position(|i| i.opcode == Opcode::Addiu && i.immediate.map(|m| m.value) == Some(3))
            .unwrap();
        assert_eq!(code[def].dests[0], Operand::Reg(Register::T8));
        assert_eq!(code[def + 1].to_string(), "sw $t8, 20($sp)");

        // And reloaded before its use.
        let reload = code
            .iter()
            .position(|i| i.to_string() == "lw $t8, 20($sp)")
            .unwrap();
        assert_eq!(code[reload + 1].sources[0], Operand::Reg(Register::T8));
        Ok(())
    }

    #[test]
    fn test_frame_spans_original_code() -> Result<()> {
        let s = SyntheticReg(0);
        let mut block = place(
            vec![
                Instruction::lw(Register::A1, 16, Register::Sp),
                Instruction::nop(),
                Instruction::jr(Register::Ra),
                Instruction::nop(),
            ],
            0x400000,
        );
        block.insert(0, Instruction::addiu(s, Register::Zero, 1));
        block.insert(2, Instruction::sw(s, 0, Register::A0));

        let (code, report) = allocate(&block, &Register::TEMPORARIES)?;
        assert_eq!(report.frame_bytes, 4);
        // The original $sp load inside the frame is rebased.
        assert!(code.iter().any(|i| i.to_string() == "lw $a1, 20($sp)"));
        assert_eq!(&code[code.len() - 3..], &block[block.len() - 3..]);
        Ok(())
    }

    #[test]
    fn test_stack_pointer_write_in_frame() {
        let s = SyntheticReg(0);
        let block = vec![
            Instruction::addiu(s, Register::Zero, 1),
            Instruction::addiu(Register::Sp, Register::Sp, -8).at(0x400004),
            Instruction::sw(s, 0, Register::A0),
        ];
        assert!(matches!(
            allocate(&block, &Register::TEMPORARIES),
            Err(Error::StackPointerClobbered { address: 0x400004 })
        ));
    }

    #[test]
    fn test_spill_temporary_named_by_block() {
        let mut run = create_synthetic_run(3);
        run.push(Instruction::addiu(Register::T8, Register::Zero, 0));
        assert!(matches!(
            allocate(&run, &[Register::T0]),
            Err(Error::RegisterPoolExhausted { .. })
        ));
    }
}
