//! Pre-transformation snapshot of the address space.
//!
//! Everything relocation needs to know about the original layout is captured here
//! before scheduling and allocation touch the program: per-block instruction counts and
//! extents, the section table, the statically targeted branches and the function
//! extents. After the transformation the program only carries the new state, so all
//! diffs are taken against this record.

use rustc_hash::FxHashMap;

use crate::{
    isa::Instruction,
    program::{BinaryImage, BlockId, FunctionId, Permissions, Program},
    Result,
};

/// What a tracked segment holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentRole {
    /// Executable section holding program blocks
    Code,
    /// The writable data section
    Data,
    /// Any other loadable section; it only occupies address space
    Other,
}

/// Original state of one loadable section.
#[derive(Debug, Clone)]
pub(crate) struct SegmentRecord {
    pub section: usize,
    pub name: String,
    pub address: u64,
    pub size: u64,
    pub offset: u64,
    pub alignment: u64,
    pub permissions: Permissions,
    pub role: SegmentRole,
}

impl SegmentRecord {
    pub fn contains(&self, address: u64) -> bool {
        address >= self.address && address < self.address + self.size
    }
}

/// Original state of one block.
#[derive(Debug, Clone)]
pub(crate) struct BlockRecord {
    pub id: BlockId,
    pub start: u64,
    /// Address of the last instruction
    pub end: u64,
    pub count: usize,
    /// Section index of the code segment holding the block
    pub segment: Option<usize>,
}

impl BlockRecord {
    pub fn size(&self) -> u64 {
        self.count as u64 * Instruction::SIZE
    }
}

/// A statically targeted control transfer and the block its operand resolves to.
#[derive(Debug, Clone)]
pub(crate) struct BranchRecord {
    /// Block holding the branch
    pub block: BlockId,
    /// Original address of the branch, stable across scheduling
    pub origin: u64,
    /// Original absolute target
    pub operand: u64,
    /// Block containing the target
    pub target: BlockId,
}

/// The captured pre-transformation state.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub blocks: Vec<BlockRecord>,
    pub segments: Vec<SegmentRecord>,
    pub branches: Vec<BranchRecord>,
    pub extents: FxHashMap<FunctionId, (u64, u64)>,
    pub address_limit: u64,
}

impl Snapshot {
    /// Records the current layout of `program` and `image`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a block holds instructions that were never
    /// placed; the snapshot must be taken on the decoded program.
    pub fn capture(program: &Program, image: &BinaryImage) -> Result<Self> {
        let mut segments = Vec::new();
        let mut has_data = false;
        for index in image.loadable_by_address() {
            let section = &image.sections[index];
            let holds_blocks = program.blocks().any(|(_, b)| section.contains(b.start));
            let role = if section.is_executable() && holds_blocks {
                SegmentRole::Code
            } else if section.is_writable() && !section.is_executable() && !has_data {
                has_data = true;
                SegmentRole::Data
            } else {
                SegmentRole::Other
            };
            segments.push(SegmentRecord {
                section: index,
                name: section.name.clone(),
                address: section.address,
                size: section.size,
                offset: section.offset,
                alignment: section.alignment,
                permissions: section.permissions,
                role,
            });
        }

        let mut blocks = Vec::with_capacity(program.block_count());
        for (id, block) in program.blocks() {
            if let Some(instr) = block.instructions.iter().find(|i| !i.is_placed()) {
                return Err(malformed_error!(
                    "Block {} holds unplaced instruction '{}' before relocation analysis",
                    id,
                    instr
                ));
            }
            let segment = segments
                .iter()
                .find(|s| s.role == SegmentRole::Code && s.contains(block.start))
                .map(|s| s.section);
            if segment.is_none() {
                log::warn!(
                    "Block {} at 0x{:08x} lies outside every code segment",
                    id,
                    block.start
                );
            }
            blocks.push(BlockRecord {
                id,
                start: block.start,
                end: block.end_address().unwrap_or(block.start),
                count: block.len(),
                segment,
            });
        }

        let mut branches = Vec::new();
        for (id, block) in program.blocks() {
            for instr in &block.instructions {
                let Some(operand) = instr.branch_target() else {
                    continue;
                };
                if !instr.is_original() {
                    continue;
                }
                match program.block_containing(operand) {
                    Some(target) => branches.push(BranchRecord {
                        block: id,
                        origin: instr.origin,
                        operand,
                        target,
                    }),
                    None => log::warn!(
                        "Target 0x{:08x} of '{}' at 0x{:08x} resolves to no block",
                        operand,
                        instr,
                        instr.origin
                    ),
                }
            }
        }

        let extents = program
            .functions()
            .filter_map(|(id, _)| program.function_extent(id).map(|extent| (id, extent)))
            .collect();

        Ok(Snapshot {
            blocks,
            segments,
            branches,
            extents,
            address_limit: image.address_limit,
        })
    }

    /// Returns the record of `block`.
    pub fn block(&self, block: BlockId) -> Option<&BlockRecord> {
        self.blocks.get(block.index()).filter(|b| b.id == block)
    }

    /// Returns the record of section `section`.
    pub fn segment(&self, section: usize) -> Option<&SegmentRecord> {
        self.segments.iter().find(|s| s.section == section)
    }

    /// Returns the blocks of code segment `section` in ascending original address order.
    pub fn blocks_in(&self, section: usize) -> Vec<&BlockRecord> {
        let mut blocks: Vec<&BlockRecord> = self
            .blocks
            .iter()
            .filter(|b| b.segment == Some(section))
            .collect();
        blocks.sort_by_key(|b| b.start);
        blocks
    }
}
