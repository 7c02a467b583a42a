//! Post-transformation address space repair.
//!
//! Scheduling and register allocation change how many instructions a block holds. This
//! module makes the program a valid, loadable image again afterwards: it resizes the
//! code segments, moves segments that no longer fit, assigns every block and instruction
//! its final address, retargets branches and fixes the symbol table.
//!
//! # Architecture
//!
//! Relocation is a two-phase state machine. [`RelocationEngine::analyze`] captures the
//! original layout before anything is mutated; [`RelocationEngine::apply`] consumes the
//! engine and performs, strictly in this order:
//!
//! 1. **Deltas** - per-block instruction count changes, summed per code segment
//! 2. **Placement** - modified segments in decreasing-growth order either grow in place
//!    or move to the first free range that fits them at their alignment
//! 3. **Re-addressing** - blocks keep their original gaps relative to the segment base
//!    and each other; moved blocks populate the [`AddressMap`]
//! 4. **Branch retargeting** - absolute references to block starts and references into
//!    the middle of a block are rewritten, then checked for reach
//! 5. **Symbols** - function symbol values and sizes follow their blocks
//! 6. **File offsets** - sections after a grown section shift in the file
//!
//! Any failure leaves the run unusable; callers work on copies and discard them on error.
//!
//! # Examples
//!
//! ```rust,ignore
//! use mipsweave::relocation::RelocationEngine;
//!
//! let engine = RelocationEngine::analyze(&program, &image)?;
//! // ... schedule and allocate ...
//! let report = engine.apply(&mut program, &mut image)?;
//! println!("{} blocks moved", report.address_map.len());
//! ```

mod address_map;
mod engine;
mod layout;
mod snapshot;

pub use address_map::AddressMap;
pub use engine::RelocationEngine;
pub use layout::{align_up, free_ranges, place, FreeRange, Placement};

use std::fmt;

use crate::compiler::EventLog;

/// What happened to a modified segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentAction {
    /// Grew into its trailing free range
    GrownInPlace,
    /// Moved to a new base address
    Relocated,
    /// Lost instructions and kept its base
    Shrunk,
}

impl fmt::Display for SegmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SegmentAction::GrownInPlace => "grown in place",
            SegmentAction::Relocated => "relocated",
            SegmentAction::Shrunk => "shrunk",
        };
        f.write_str(name)
    }
}

/// Layout change of one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentChange {
    /// Section name
    pub name: String,
    /// Index into [`BinaryImage::sections`](crate::program::BinaryImage::sections)
    pub section: usize,
    pub old_address: u64,
    pub new_address: u64,
    pub old_size: u64,
    pub new_size: u64,
    pub action: SegmentAction,
}

impl SegmentChange {
    /// Bytes gained (negative when shrunk).
    #[must_use]
    pub fn growth(&self) -> i64 {
        i64::try_from(self.new_size).unwrap_or(i64::MAX)
            - i64::try_from(self.old_size).unwrap_or(i64::MAX)
    }
}

impl fmt::Display for SegmentChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: 0x{:08x}+{} -> 0x{:08x}+{}",
            self.name, self.action, self.old_address, self.old_size, self.new_address, self.new_size
        )
    }
}

/// Outcome of [`RelocationEngine::apply`].
#[derive(Debug, Clone, Default)]
pub struct RelocationReport {
    /// Old to new start address of every moved block
    pub address_map: AddressMap,
    /// Segments whose size changed, in processing order
    pub segments: Vec<SegmentChange>,
    pub branches_retargeted: usize,
    pub symbols_updated: usize,
    pub sections_shifted: usize,
    /// Relocation events
    pub events: EventLog,
}

impl RelocationReport {
    /// Returns `true` if the layout is unchanged.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.address_map.is_empty() && self.segments.is_empty() && self.sections_shifted == 0
    }

    /// Returns the change of the segment named `name`.
    #[must_use]
    pub fn segment(&self, name: &str) -> Option<&SegmentChange> {
        self.segments.iter().find(|s| s.name == name)
    }
}
