//! The relocation engine.

use rustc_hash::FxHashMap;

use crate::{
    compiler::{EventKind, EventLog},
    isa::{Immediate, Instruction, OpClass},
    program::{BinaryImage, Program, SymbolKind},
    relocation::{
        layout::{align_up, free_ranges, place, Placement},
        snapshot::{SegmentRole, Snapshot},
        AddressMap, RelocationReport, SegmentAction, SegmentChange,
    },
    Error, Result,
};

/// Address bits a `j`/`jal` cannot change: targets stay in the 256 MiB region of the
/// delay slot.
const JUMP_REGION_MASK: u64 = !0x0fff_ffff;

/// Repairs the address space of a transformed program.
///
/// The engine is created by [`analyze`](Self::analyze) on the untouched program and
/// consumed by [`apply`](Self::apply) once the transformation is done. There is no way
/// to apply the same analysis twice.
#[derive(Debug, Clone)]
pub struct RelocationEngine {
    snapshot: Snapshot,
}

impl RelocationEngine {
    /// Captures the original layout of `program` and `image`.
    ///
    /// Must run before any block is scheduled or allocated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the program already holds unplaced instructions.
    pub fn analyze(program: &Program, image: &BinaryImage) -> Result<Self> {
        let snapshot = Snapshot::capture(program, image)?;

        let code = snapshot
            .segments
            .iter()
            .filter(|s| s.role == SegmentRole::Code)
            .count();
        let data = snapshot
            .segments
            .iter()
            .find(|s| s.role == SegmentRole::Data)
            .map_or("none", |s| s.name.as_str());
        log::debug!(
            "Relocation analysis: {} blocks, {} branches, {} code segments, data segment {}",
            snapshot.blocks.len(),
            snapshot.branches.len(),
            code,
            data
        );

        Ok(RelocationEngine { snapshot })
    }

    /// Lowers the address bound for segment placement to `limit`.
    #[must_use]
    pub fn with_address_limit(mut self, limit: u64) -> Self {
        self.snapshot.address_limit = self.snapshot.address_limit.min(limit);
        self
    }

    /// Upper bound of the address space segments may be placed in.
    #[must_use]
    pub fn address_limit(&self) -> u64 {
        self.snapshot.address_limit
    }

    /// Number of statically targeted control transfers tracked for retargeting.
    #[must_use]
    pub fn branch_count(&self) -> usize {
        self.snapshot.branches.len()
    }

    /// Repairs the layout after the transformation.
    ///
    /// # Arguments
    ///
    /// * `program` - The transformed program, same arena as analyzed
    /// * `image` - The image analyzed together with the program
    ///
    /// # Returns
    ///
    /// A [`RelocationReport`] with the address map and every layout change.
    ///
    /// # Errors
    ///
    /// - [`Error::NoPlacementFound`] if a grown segment fits nowhere below the limit
    /// - [`Error::BranchOutOfRange`] if a retargeted transfer can no longer be encoded
    /// - [`Error::Malformed`] if the program does not match the analysis
    pub fn apply(self, program: &mut Program, image: &mut BinaryImage) -> Result<RelocationReport> {
        if program.block_count() != self.snapshot.blocks.len() {
            return Err(malformed_error!(
                "Program has {} blocks, analysis recorded {}",
                program.block_count(),
                self.snapshot.blocks.len()
            ));
        }

        let events = EventLog::new();

        let mut segments = Vec::new();
        for (section, delta) in self.segment_deltas(program)? {
            segments.push(self.place_segment(section, delta, image, &events)?);
        }

        let address_map = self.readdress_blocks(program, image, &events)?;
        let branches_retargeted = self.retarget_branches(program, &events)?;
        self.validate_reach(program)?;
        let symbols_updated = self.fix_symbols(program, image, &address_map, &events);
        let sections_shifted = self.shift_file_offsets(image, &segments, &events);

        log::info!(
            "Relocation: {} segments changed, {} blocks moved, {} branches retargeted",
            segments.len(),
            address_map.len(),
            branches_retargeted
        );

        Ok(RelocationReport {
            address_map,
            segments,
            branches_retargeted,
            symbols_updated,
            sections_shifted,
            events,
        })
    }

    /// Byte growth per code segment, largest first; unchanged segments are omitted.
    fn segment_deltas(&self, program: &Program) -> Result<Vec<(usize, i64)>> {
        let mut deltas: FxHashMap<usize, i64> = FxHashMap::default();

        for record in &self.snapshot.blocks {
            let block = program
                .block(record.id)
                .ok_or_else(|| malformed_error!("Block {} vanished after analysis", record.id))?;

            match record.segment {
                Some(segment) => {
                    *deltas.entry(segment).or_default() += byte_delta(block.len(), record.count);
                }
                None if block.len() != record.count => {
                    return Err(malformed_error!(
                        "Block {} outside every code segment changed size",
                        record.id
                    ));
                }
                None => {}
            }
        }

        let mut modified: Vec<(usize, i64)> =
            deltas.into_iter().filter(|(_, delta)| *delta != 0).collect();
        modified.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(modified)
    }

    fn place_segment(
        &self,
        section: usize,
        delta: i64,
        image: &mut BinaryImage,
        events: &EventLog,
    ) -> Result<SegmentChange> {
        let record = self
            .snapshot
            .segment(section)
            .ok_or_else(|| malformed_error!("Section {} was not analyzed", section))?;
        let current = image
            .sections
            .get(section)
            .ok_or_else(|| malformed_error!("Section {} vanished after analysis", section))?;
        let (address, size) = (current.address, current.size);

        let required = size.checked_add_signed(delta).ok_or_else(|| {
            malformed_error!("Segment '{}' would shrink below zero bytes", record.name)
        })?;

        let ranges = free_ranges(image, self.snapshot.address_limit);
        let placement = place(address, size, required, record.alignment, &ranges).ok_or_else(
            || Error::NoPlacementFound {
                segment: record.name.clone(),
                required,
            },
        )?;

        let (new_address, action) = match placement {
            Placement::InPlace if delta < 0 => (address, SegmentAction::Shrunk),
            Placement::InPlace => (address, SegmentAction::GrownInPlace),
            Placement::Relocate(base) => (base, SegmentAction::Relocated),
        };

        if let Some(target) = image.sections.get_mut(section) {
            target.address = new_address;
            target.size = required;
        }

        let change = SegmentChange {
            name: record.name.clone(),
            section,
            old_address: address,
            new_address,
            old_size: size,
            new_size: required,
            action,
        };
        log::info!("Segment {} ({:?})", change, record.permissions);

        let kind = match action {
            SegmentAction::Relocated => EventKind::SegmentRelocated,
            SegmentAction::GrownInPlace | SegmentAction::Shrunk => EventKind::SegmentGrown,
        };
        events
            .record(kind)
            .address(new_address)
            .message(change.to_string());

        Ok(change)
    }

    /// Assigns final addresses to every block of every code segment.
    ///
    /// The gap between the segment base and the first block and the gaps between
    /// consecutive blocks are those of the original layout. Blocks of unmodified
    /// segments keep their start; their instructions are renumbered all the same,
    /// since scheduling may have reordered them.
    fn readdress_blocks(
        &self,
        program: &mut Program,
        image: &BinaryImage,
        events: &EventLog,
    ) -> Result<AddressMap> {
        let mut map = AddressMap::new();

        for segment in self
            .snapshot
            .segments
            .iter()
            .filter(|s| s.role == SegmentRole::Code)
        {
            let base = image
                .sections
                .get(segment.section)
                .map(|s| s.address)
                .ok_or_else(|| malformed_error!("Section '{}' vanished", segment.name))?;

            let mut cursor = base;
            let mut previous_end = segment.address;
            for record in self.snapshot.blocks_in(segment.section) {
                cursor += record.start.saturating_sub(previous_end);
                previous_end = record.start + record.size();

                let block = program.block_mut(record.id)?;
                block.assign_addresses(cursor);
                let (function, size) = (block.function, block.size());

                if cursor != record.start {
                    map.insert(record.start, cursor);
                    let name = program
                        .function(function)
                        .map(|f| f.name.clone())
                        .unwrap_or_default();
                    events.record(EventKind::BlockMoved).at(name, cursor).message(format!(
                        "{} moved from 0x{:08x} to 0x{:08x}",
                        record.id, record.start, cursor
                    ));
                }
                cursor += size;
            }
        }

        Ok(map)
    }

    /// Rewrites the operands of recorded branches.
    ///
    /// A branch to the start of a block follows the block. A branch into the middle of a
    /// block follows the instruction it pointed at, found by its original address; if
    /// that instruction is gone the offset from the block start is kept.
    fn retarget_branches(&self, program: &mut Program, events: &EventLog) -> Result<usize> {
        let mut retargeted = 0;

        for branch in &self.snapshot.branches {
            let original = self
                .snapshot
                .block(branch.target)
                .ok_or_else(|| malformed_error!("Target block {} not analyzed", branch.target))?;
            let target = program
                .block(branch.target)
                .ok_or_else(|| malformed_error!("Target block {} vanished", branch.target))?;

            let new_target = if branch.operand == original.start {
                target.start
            } else if branch.operand <= original.end {
                target
                    .instructions
                    .iter()
                    .find(|instr| instr.origin == branch.operand)
                    .map_or(target.start + (branch.operand - original.start), |instr| {
                        instr.address
                    })
            } else {
                continue;
            };

            let holder = program.block_mut(branch.block)?;
            let function = holder.function;
            let Some(instr) = holder
                .instructions
                .iter_mut()
                .find(|i| i.origin == branch.origin && i.opcode.has_static_target())
            else {
                log::warn!(
                    "Control transfer originally at 0x{:08x} disappeared from {}",
                    branch.origin,
                    branch.block
                );
                continue;
            };

            if instr.branch_target() == Some(new_target) {
                continue;
            }
            instr.set_branch_target(new_target);
            let (address, text) = (instr.address, instr.to_string());
            retargeted += 1;

            let name = program
                .function(function)
                .map(|f| f.name.clone())
                .unwrap_or_default();
            events
                .record(EventKind::BranchRetargeted)
                .at(name, address)
                .message(format!(
                    "0x{:08x} -> 0x{:08x} ({})",
                    branch.operand, new_target, text
                ));
        }

        Ok(retargeted)
    }

    fn validate_reach(&self, program: &Program) -> Result<()> {
        for branch in &self.snapshot.branches {
            let instr = program.block(branch.block).and_then(|block| {
                block
                    .instructions
                    .iter()
                    .find(|i| i.origin == branch.origin && i.opcode.has_static_target())
            });
            if let Some(instr) = instr {
                check_reach(instr)?;
            }
        }
        Ok(())
    }

    /// Moves function symbols with their entry block and adjusts their size by the
    /// growth of the function. Also follows the image entry point.
    fn fix_symbols(
        &self,
        program: &Program,
        image: &mut BinaryImage,
        map: &AddressMap,
        events: &EventLog,
    ) -> usize {
        if let Some(entry) = map.get(image.entry) {
            image.entry = entry;
        }

        let mut updated = 0;
        for symbol in image
            .symbols
            .iter_mut()
            .filter(|s| s.kind == SymbolKind::Function)
        {
            let (old_value, old_size) = (symbol.value, symbol.size);
            if let Some(value) = map.get(symbol.value) {
                symbol.value = value;
            }

            let extents = program.function_by_name(&symbol.name).and_then(|id| {
                self.snapshot
                    .extents
                    .get(&id)
                    .copied()
                    .zip(program.function_extent(id))
            });
            if let Some(((old_start, old_end), (start, end))) = extents {
                let growth = signed(end - start) - signed(old_end - old_start);
                symbol.size = symbol.size.saturating_add_signed(growth);
            }

            if symbol.value != old_value || symbol.size != old_size {
                updated += 1;
                events
                    .record(EventKind::SymbolUpdated)
                    .at(symbol.name.clone(), symbol.value)
                    .message(format!(
                        "{}: 0x{:08x}+{} -> 0x{:08x}+{}",
                        symbol.name, old_value, old_size, symbol.value, symbol.size
                    ));
            }
        }
        updated
    }

    /// Shifts the file offset of every section behind a grown section.
    ///
    /// Sections are walked in original file order. Each one is moved by the growth
    /// accumulated before it, rounded up to its alignment so its offset keeps the same
    /// residue.
    fn shift_file_offsets(
        &self,
        image: &mut BinaryImage,
        segments: &[SegmentChange],
        events: &EventLog,
    ) -> usize {
        let growth: FxHashMap<usize, u64> = segments
            .iter()
            .filter(|s| s.new_size > s.old_size)
            .map(|s| (s.section, s.new_size - s.old_size))
            .collect();
        if growth.is_empty() {
            return 0;
        }

        let original_offset = |index: usize, current: u64| {
            self.snapshot.segment(index).map_or(current, |s| s.offset)
        };
        let mut order: Vec<(usize, u64)> = image
            .sections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.offset > 0)
            .map(|(index, s)| (index, original_offset(index, s.offset)))
            .collect();
        order.sort_by_key(|&(index, offset)| (offset, index));

        let mut shift = 0u64;
        let mut shifted = 0;
        for (index, offset) in order {
            let Some(section) = image.sections.get_mut(index) else {
                continue;
            };
            if shift > 0 {
                let moved = align_up(shift, section.alignment).unwrap_or(shift);
                section.offset = offset + moved;
                shift = moved;
                shifted += 1;
                events
                    .record(EventKind::SectionShifted)
                    .address(section.address)
                    .message(format!(
                        "{}: file offset 0x{:x} -> 0x{:x}",
                        section.name, offset, section.offset
                    ));
            }
            shift += growth.get(&index).copied().unwrap_or(0);
        }
        shifted
    }
}

/// Checks that `instr` can still encode its target.
///
/// Conditional branches carry a signed 16-bit word offset relative to the delay slot;
/// `j` and `jal` replace the low 28 bits of the delay slot address.
fn check_reach(instr: &Instruction) -> Result<()> {
    let Some(target) = instr.branch_target() else {
        return Ok(());
    };
    let delay_slot = instr.address.wrapping_add(Instruction::SIZE);

    let reachable = match instr.class() {
        OpClass::Branch => {
            let offset = i128::from(target) - i128::from(delay_slot);
            offset % 4 == 0
                && i64::try_from(offset / 4).is_ok_and(|words| Immediate::fits_signed(words, 16))
        }
        _ => target % 4 == 0 && delay_slot & JUMP_REGION_MASK == target & JUMP_REGION_MASK,
    };

    if reachable {
        Ok(())
    } else {
        Err(Error::BranchOutOfRange {
            address: instr.address,
            target,
        })
    }
}

fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[allow(clippy::cast_possible_wrap)]
fn byte_delta(new: usize, old: usize) -> i64 {
    (new as i64 - old as i64) * Instruction::SIZE as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        isa::{Opcode, Register},
        program::{Permissions, Section},
        test::{create_image, create_program, place as place_at, F_ENTRY, F_EXIT},
    };

    fn grow_entry(program: &mut Program, entry: crate::program::BlockId, count: usize) {
        let block = program.block_mut(entry).unwrap();
        for _ in 0..count {
            block.instructions.insert(1, Instruction::nop());
        }
    }

    #[test]
    fn test_unmodified_program_is_a_noop() -> Result<()> {
        let (mut program, entry, exit) = create_program();
        let mut image = create_image();
        let before = image.clone();

        let engine = RelocationEngine::analyze(&program, &image)?;
        let report = engine.apply(&mut program, &mut image)?;

        assert!(report.is_noop());
        assert!(report.address_map.is_empty());
        assert_eq!(image, before);
        assert_eq!(program.block(entry).unwrap().start, F_ENTRY);
        assert_eq!(program.block(exit).unwrap().start, F_EXIT);
        assert_eq!(report.branches_retargeted, 0);
        Ok(())
    }

    #[test]
    fn test_grown_segment_relocated() -> Result<()> {
        let (mut program, entry, exit) = create_program();
        let mut image = create_image();
        let engine = RelocationEngine::analyze(&program, &image)?;

        grow_entry(&mut program, entry, 3);
        let report = engine.apply(&mut program, &mut image)?;

        let text = report.segment(".text").unwrap();
        assert_eq!(text.action, SegmentAction::Relocated);
        assert_eq!(text.new_address, 0x400100);
        assert_eq!(text.new_size, 76);
        assert_eq!(image.sections[0].address, 0x400100);

        // Same 8-byte gap to the segment base as before.
        let entry_block = program.block(entry).unwrap();
        assert_eq!(entry_block.start, 0x400108);
        assert_eq!(program.block(exit).unwrap().start, 0x40012c);
        assert_eq!(report.address_map.len(), 2);
        assert_eq!(report.address_map.get(F_EXIT), Some(0x40012c));

        let branch = entry_block
            .instructions
            .iter()
            .find(|i| i.opcode == Opcode::Beq)
            .unwrap();
        assert_eq!(branch.branch_target(), Some(0x40012c));
        assert_eq!(report.branches_retargeted, 1);
        assert!(entry_block.instructions.iter().all(Instruction::is_placed));

        let symbol = image.symbols.by_name("f").unwrap();
        assert_eq!(symbol.value, 0x400108);
        assert_eq!(symbol.size, 48);
        assert_eq!(report.symbols_updated, 1);

        // .data and .rodata follow the 12 grown bytes at 16-byte alignment.
        assert_eq!(image.sections[1].offset, 0x1050);
        assert_eq!(image.sections[2].offset, 0x1090);
        assert_eq!(report.sections_shifted, 2);

        assert!(report.events.has(EventKind::SegmentRelocated));
        assert_eq!(report.events.count_kind(EventKind::BlockMoved), 2);
        Ok(())
    }

    #[test]
    fn test_grow_in_place() -> Result<()> {
        let (mut program, entry, exit) = create_program();
        let mut image = create_image();
        image.sections[0].size = 0x30;
        let engine = RelocationEngine::analyze(&program, &image)?;

        grow_entry(&mut program, entry, 3);
        let report = engine.apply(&mut program, &mut image)?;

        let text = report.segment(".text").unwrap();
        assert_eq!(text.action, SegmentAction::GrownInPlace);
        assert_eq!(image.sections[0].address, 0x400000);
        assert_eq!(image.sections[0].size, 0x3c);

        // Only the exit block moved.
        assert_eq!(program.block(entry).unwrap().start, F_ENTRY);
        assert_eq!(program.block(exit).unwrap().start, 0x40002c);
        assert_eq!(report.address_map.len(), 1);
        Ok(())
    }

    #[test]
    fn test_no_placement_found() -> Result<()> {
        let (mut program, entry, _) = create_program();
        let mut image = create_image();
        let engine = RelocationEngine::analyze(&program, &image)?.with_address_limit(0x400100);
        assert_eq!(engine.address_limit(), 0x400100);

        grow_entry(&mut program, entry, 3);
        let err = engine.apply(&mut program, &mut image).unwrap_err();
        assert!(matches!(
            err,
            Error::NoPlacementFound { ref segment, required: 76 } if segment == ".text"
        ));
        Ok(())
    }

    #[test]
    fn test_shrunk_segment() -> Result<()> {
        let (mut program, entry, exit) = create_program();
        let mut image = create_image();
        let engine = RelocationEngine::analyze(&program, &image)?;

        // Drop the second instruction of the entry block.
        program.block_mut(entry)?.instructions.remove(1);
        let report = engine.apply(&mut program, &mut image)?;

        assert_eq!(report.segment(".text").unwrap().action, SegmentAction::Shrunk);
        assert_eq!(image.sections[0].size, 60);
        assert_eq!(program.block(exit).unwrap().start, F_EXIT - 4);
        assert_eq!(report.sections_shifted, 0);
        Ok(())
    }

    #[test]
    fn test_intra_block_reference_follows_instruction() -> Result<()> {
        let mut program = Program::new();
        let f = program.add_function("loop");
        let block = program.add_block(
            f,
            0x400000,
            place_at(
                vec![
                    Instruction::nop(),
                    Instruction::addiu(Register::T0, Register::T0, -1),
                    Instruction::branch(Opcode::Bne, Register::T0, Register::Zero, 0x400004),
                    Instruction::nop(),
                ],
                0x400000,
            ),
        )?;
        let mut image = BinaryImage::default();
        image.add_section(Section::new(
            ".text",
            0x400000,
            0x10,
            0x1000,
            16,
            Permissions::READ | Permissions::EXECUTE,
        ));

        let engine = RelocationEngine::analyze(&program, &image)?;
        assert_eq!(engine.branch_count(), 1);
        let instrs = &mut program.block_mut(block)?.instructions;
        instrs.insert(0, Instruction::nop());
        instrs.insert(0, Instruction::nop());
        let report = engine.apply(&mut program, &mut image)?;

        assert!(report.address_map.is_empty());
        let instrs = &program.block(block).unwrap().instructions;
        assert_eq!(instrs[3].origin, 0x400004);
        assert_eq!(instrs[4].branch_target(), Some(0x40000c));
        assert_eq!(report.branches_retargeted, 1);
        Ok(())
    }

    #[test]
    fn test_branch_out_of_range() -> Result<()> {
        let (mut program, entry, _) = create_program();
        let mut image = BinaryImage::default();
        // Entry and exit live in separate code sections with 1 MiB of data between the
        // exit and the first free range.
        image.add_section(Section::new(
            ".text",
            0x400000,
            0x20,
            0x1000,
            16,
            Permissions::READ | Permissions::EXECUTE,
        ));
        image.add_section(Section::new(
            ".text.exit",
            0x400020,
            0x20,
            0x1020,
            16,
            Permissions::READ | Permissions::EXECUTE,
        ));
        image.add_section(Section::new(
            ".data",
            0x400040,
            0x100000 - 0x40,
            0x1040,
            16,
            Permissions::READ | Permissions::WRITE,
        ));

        let engine = RelocationEngine::analyze(&program, &image)?;
        grow_entry(&mut program, entry, 3);
        let err = engine.apply(&mut program, &mut image).unwrap_err();
        assert!(matches!(
            err,
            Error::BranchOutOfRange {
                target: F_EXIT,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn test_check_reach() {
        let near = Instruction::branch(Opcode::Beq, Register::T0, Register::Zero, 0x400100)
            .at(0x400000);
        assert!(check_reach(&near).is_ok());

        let far = Instruction::branch(Opcode::Beq, Register::T0, Register::Zero, 0x500000)
            .at(0x400000);
        assert!(check_reach(&far).is_err());

        let jump = Instruction::jump(0x0ff0_0000).at(0x0000_1000);
        assert!(check_reach(&jump).is_ok());
        let jump = Instruction::jump(0x1000_0000).at(0x0000_1000);
        assert!(check_reach(&jump).is_err());
    }

    #[test]
    fn test_block_count_mismatch() -> Result<()> {
        let (mut program, _, _) = create_program();
        let mut image = create_image();
        let engine = RelocationEngine::analyze(&program, &image)?;
        let f = program.function_by_name("f").unwrap();
        program.add_block(f, 0x400030, Vec::new())?;
        assert!(engine.apply(&mut program, &mut image).is_err());
        Ok(())
    }
}
