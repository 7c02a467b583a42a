//! Stack frames opened around allocated code.
//!
//! Both allocation strategies borrow physical registers that may hold live program
//! values. Before the borrowed range the registers are stored into a fresh stack frame,
//! afterwards they are reloaded in reverse order and the frame is released:
//!
//! ```text
//! addiu $sp, $sp, -4n
//! sw    $t0, 0($sp)          saved registers
//! sw    $t1, 4($sp)
//! sw    $at, 8($sp)          accumulator triple (optional)
//! mfhi  $at
//! sw    $at, 12($sp)
//! mflo  $at
//! sw    $at, 16($sp)
//!                            spill slots (linear scan)
//! ...   allocated code
//! lw    $at, 16($sp)
//! mtlo  $at
//! lw    $at, 12($sp)
//! mthi  $at
//! lw    $at, 8($sp)
//! lw    $t1, 4($sp)
//! lw    $t0, 0($sp)
//! addiu $sp, $sp, 4n
//! ```

use crate::{
    isa::{Immediate, Instruction, OpClass, Opcode, Operand, Register},
    Error, Result,
};

/// Word size of one frame slot.
const SLOT_BYTES: i64 = 4;

/// Layout of one allocation frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Frame {
    /// Registers stored on entry, in slot order
    pub saved: Vec<Register>,
    /// Temporary carrying `hi`/`lo` when the accumulator is saved
    pub accumulator: Option<Register>,
    /// Number of spill slots after the saved registers
    pub spill_slots: u32,
}

impl Frame {
    /// Number of words the frame occupies.
    pub fn words(&self) -> i64 {
        let accumulator = if self.accumulator.is_some() { 3 } else { 0 };
        self.saved.len() as i64 + accumulator + i64::from(self.spill_slots)
    }

    /// Size of the frame in bytes.
    pub fn bytes(&self) -> i64 {
        self.words() * SLOT_BYTES
    }

    /// Returns `true` if no code has to be emitted for the frame.
    pub fn is_empty(&self) -> bool {
        self.words() == 0
    }

    /// `$sp` offset of spill slot `slot`.
    pub fn slot_offset(&self, slot: u32) -> i64 {
        let accumulator = if self.accumulator.is_some() { 3 } else { 0 };
        (self.saved.len() as i64 + accumulator + i64::from(slot)) * SLOT_BYTES
    }

    /// Instructions opening the frame.
    pub fn prologue(&self) -> Vec<Instruction> {
        if self.is_empty() {
            return Vec::new();
        }

        let mut code = vec![Instruction::addiu(Register::Sp, Register::Sp, -self.bytes())];
        for (index, reg) in self.saved.iter().enumerate() {
            code.push(Instruction::sw(*reg, index as i64 * SLOT_BYTES, Register::Sp));
        }
        if let Some(temp) = self.accumulator {
            let base = self.saved.len() as i64 * SLOT_BYTES;
            code.push(Instruction::sw(temp, base, Register::Sp));
            code.push(Instruction::mfhi(temp));
            code.push(Instruction::sw(temp, base + SLOT_BYTES, Register::Sp));
            code.push(Instruction::mflo(temp));
            code.push(Instruction::sw(temp, base + 2 * SLOT_BYTES, Register::Sp));
        }
        code
    }

    /// Instructions closing the frame, the mirror image of [`Frame::prologue`].
    pub fn epilogue(&self) -> Vec<Instruction> {
        if self.is_empty() {
            return Vec::new();
        }

        let mut code = Vec::new();
        if let Some(temp) = self.accumulator {
            let base = self.saved.len() as i64 * SLOT_BYTES;
            code.push(Instruction::lw(temp, base + 2 * SLOT_BYTES, Register::Sp));
            code.push(Instruction::mtlo(temp));
            code.push(Instruction::lw(temp, base + SLOT_BYTES, Register::Sp));
            code.push(Instruction::mthi(temp));
            code.push(Instruction::lw(temp, base, Register::Sp));
        }
        for (index, reg) in self.saved.iter().enumerate().rev() {
            code.push(Instruction::lw(*reg, index as i64 * SLOT_BYTES, Register::Sp));
        }
        code.push(Instruction::addiu(Register::Sp, Register::Sp, self.bytes()));
        code
    }
}

/// Shifts `$sp`-relative operands of `instructions` past a frame of `bytes` bytes.
///
/// Loads and stores based on `$sp` and `addiu/addi rt, $sp, imm` address computations get
/// `bytes` added to their immediate.
///
/// # Errors
///
/// Returns [`Error::StackPointerClobbered`] for an instruction writing `$sp`, and
/// [`Error::Malformed`] if `$sp` is read in a way that cannot be rebased or a rebased
/// offset no longer fits its field.
pub(crate) fn rebase_stack_operands(instructions: &mut [Instruction], bytes: i64) -> Result<()> {
    if bytes == 0 {
        return Ok(());
    }

    let sp = Operand::Reg(Register::Sp);
    for instr in instructions.iter_mut() {
        if instr.writes_register(Register::Sp) {
            return Err(Error::StackPointerClobbered {
                address: instr.origin,
            });
        }
        if !instr.sources.contains(&sp) {
            continue;
        }

        let rebasable = match instr.class() {
            OpClass::Load => instr.base_register() == Some(&sp),
            OpClass::Store => {
                instr.base_register() == Some(&sp) && instr.sources.first() != Some(&sp)
            }
            _ => matches!(instr.opcode, Opcode::Addiu | Opcode::Addi),
        };
        let Some(imm) = instr.immediate.filter(|_| rebasable) else {
            return Err(malformed_error!(
                "Cannot rebase '{}' across an allocation frame",
                instr
            ));
        };

        let value = imm.value + bytes;
        if !Immediate::fits_signed(value, imm.bits) {
            return Err(malformed_error!(
                "Rebased offset {} of '{}' exceeds {} bits",
                value,
                instr,
                imm.bits
            ));
        }
        instr.immediate = Some(Immediate::new(value, imm.bits));
    }
    Ok(())
}

/// Index of the block's last control transfer.
///
/// Allocated code must end before it: nothing may be inserted between a transfer and
/// its delay slot or after the delay slot.
pub(crate) fn terminator_index(instructions: &[Instruction]) -> Option<usize> {
    instructions
        .iter()
        .rposition(|instr| instr.opcode.is_control_transfer())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prologue_epilogue_nesting() {
        let frame = Frame {
            saved: vec![Register::T0, Register::T1],
            accumulator: None,
            spill_slots: 0,
        };
        let prologue = frame.prologue();
        let epilogue = frame.epilogue();

        assert_eq!(frame.bytes(), 8);
        assert_eq!(prologue.len(), 3);
        assert_eq!(epilogue.len(), 3);
        assert_eq!(prologue[0].to_string(), "addiu $sp, $sp, -8");
        assert_eq!(prologue[2].to_string(), "sw $t1, 4($sp)");
        // Last stored, first reloaded.
        assert_eq!(epilogue[0].to_string(), "lw $t1, 4($sp)");
        assert_eq!(epilogue[2].to_string(), "addiu $sp, $sp, 8");
    }

    #[test]
    fn test_accumulator_triple() {
        let frame = Frame {
            saved: vec![Register::T0],
            accumulator: Some(Register::At),
            spill_slots: 2,
        };
        assert_eq!(frame.words(), 6);
        assert_eq!(frame.slot_offset(1), 20);

        let prologue = frame.prologue();
        assert_eq!(prologue.len(), 7);
        assert_eq!(prologue[3].opcode, Opcode::Mfhi);
        assert_eq!(prologue[5].opcode, Opcode::Mflo);

        let epilogue = frame.epilogue();
        assert_eq!(epilogue[1].opcode, Opcode::Mtlo);
        assert_eq!(epilogue[3].opcode, Opcode::Mthi);
        assert_eq!(epilogue.len(), 7);
    }

    #[test]
    fn test_empty_frame_emits_nothing() {
        let frame = Frame::default();
        assert!(frame.is_empty());
        assert!(frame.prologue().is_empty());
        assert!(frame.epilogue().is_empty());
    }

    #[test]
    fn test_rebase() {
        let mut instrs = vec![
            Instruction::lw(Register::T0, 16, Register::Sp),
            Instruction::sw(Register::Ra, 20, Register::Sp),
            Instruction::addiu(Register::A0, Register::Sp, 4),
            Instruction::lw(Register::T1, 0, Register::A0),
        ];
        rebase_stack_operands(&mut instrs, 8).unwrap();
        assert_eq!(instrs[0].to_string(), "lw $t0, 24($sp)");
        assert_eq!(instrs[1].to_string(), "sw $ra, 28($sp)");
        assert_eq!(instrs[2].immediate.map(|i| i.value), Some(12));
        assert_eq!(instrs[3].immediate.map(|i| i.value), Some(0));
    }

    #[test]
    fn test_rebase_rejects_sp_write() {
        let mut instrs = vec![Instruction::addiu(Register::Sp, Register::Sp, -8).at(0x400010)];
        assert!(matches!(
            rebase_stack_operands(&mut instrs, 4),
            Err(Error::StackPointerClobbered { address: 0x400010 })
        ));
    }

    #[test]
    fn test_rebase_rejects_sp_copy() {
        let mut instrs = vec![Instruction::alu(
            Opcode::Addu,
            Register::Fp,
            Register::Sp,
            Register::Zero,
        )];
        assert!(rebase_stack_operands(&mut instrs, 4).is_err());
    }

    #[test]
    fn test_terminator_index() {
        let instrs = [
            Instruction::nop(),
            Instruction::jr(Register::Ra),
            Instruction::nop(),
        ];
        assert_eq!(terminator_index(&instrs), Some(1));
        assert_eq!(terminator_index(&instrs[..1]), None);
        assert_eq!(terminator_index(&[]), None);
    }
}
