//! Relocation engine integration tests.
//!
//! These tests drive [`RelocationEngine`] directly: the program is changed by hand
//! between `analyze` and `apply`, the way the scheduler and allocator would change it.

mod common;

use common::{image, program, F_ENTRY, F_EXIT};
use mipsweave::{
    prelude::*,
    relocation::{free_ranges, place, FreeRange, Placement},
};

#[test]
fn test_grown_text_moves_past_rodata() -> Result<()> {
    let (mut program, entry, exit) = program();
    let mut image = image();

    let engine = RelocationEngine::analyze(&program, &image)?;
    program
        .block_mut(entry)?
        .instructions
        .splice(4..4, [Instruction::nop(), Instruction::nop(), Instruction::nop()]);

    let report = engine.apply(&mut program, &mut image)?;

    // 64 + 12 bytes no longer fit in place or in the 64-byte hole after .data.
    let text = image.section(".text").unwrap();
    assert_eq!(text.address, 0x400100);
    assert_eq!(text.size, 76);
    assert_eq!(
        report.segment(".text").map(|c| c.action),
        Some(SegmentAction::Relocated)
    );

    let entry_block = program.block(entry).unwrap();
    let exit_block = program.block(exit).unwrap();
    assert_eq!(entry_block.start, 0x400108);
    assert_eq!(exit_block.start, 0x40012c);
    assert_eq!(report.address_map.len(), 2);
    assert_eq!(report.address_map.get(F_ENTRY), Some(0x400108));
    assert_eq!(report.address_map.get(F_EXIT), Some(0x40012c));

    let branch = entry_block.terminator().unwrap();
    assert_eq!(branch.branch_target(), Some(0x40012c));
    assert_eq!(branch.address, 0x400124);

    let f = image.symbols.by_name("f").unwrap();
    assert_eq!(f.value, 0x400108);
    assert_eq!(f.size, 48);
    Ok(())
}

#[test]
fn test_unchanged_program_is_noop() -> Result<()> {
    let (mut program, _, _) = program();
    let mut image = image();
    let (program_before, image_before) = (program.clone(), image.clone());

    let report = RelocationEngine::analyze(&program, &image)?.apply(&mut program, &mut image)?;

    assert!(report.is_noop());
    assert!(report.address_map.is_empty());
    assert_eq!(program, program_before);
    assert_eq!(image, image_before);
    Ok(())
}

#[test]
fn test_no_free_range() -> Result<()> {
    let (mut program, entry, _) = program();
    let mut image = image();

    let engine = RelocationEngine::analyze(&program, &image)?.with_address_limit(0x400100);
    program
        .block_mut(entry)?
        .instructions
        .splice(4..4, [Instruction::nop(), Instruction::nop(), Instruction::nop()]);

    match engine.apply(&mut program, &mut image) {
        Err(Error::NoPlacementFound { segment, required }) => {
            assert_eq!(segment, ".text");
            assert_eq!(required, 76);
        }
        other => panic!("expected NoPlacementFound, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_free_ranges_of_fixture() {
    let image = image();
    let ranges = free_ranges(&image, image.address_limit);
    assert_eq!(
        ranges,
        vec![
            FreeRange::new(0x400080, 0x4000c0),
            FreeRange::new(0x400100, 0x8000_0000),
        ]
    );
    assert_eq!(
        place(0x400000, 0x40, 76, 16, &ranges),
        Some(Placement::Relocate(0x400100))
    );
}
