//! Live intervals and the linear-scan core.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::isa::{Instruction, Register, SyntheticReg};

/// Live range of a synthetic register within one block.
///
/// Both ends are inclusive instruction positions: `start` is the first instruction
/// naming the register, `end` the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveInterval {
    /// The synthetic register
    pub reg: SyntheticReg,
    /// First position the register is live at
    pub start: usize,
    /// Last position the register is live at
    pub end: usize,
}

impl LiveInterval {
    fn new(reg: SyntheticReg, pos: usize) -> Self {
        Self {
            reg,
            start: pos,
            end: pos,
        }
    }

    fn extend_end(&mut self, pos: usize) {
        self.end = self.end.max(pos);
    }
}

/// Where a synthetic register lives after allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// A physical register for the whole interval
    Register(Register),
    /// A frame slot, reloaded around every access
    Slot(u32),
}

/// Outcome of one linear-scan run.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Location of every synthetic register
    pub assignment: FxHashMap<SyntheticReg, Location>,
    /// Number of spill slots handed out
    pub slots: u32,
    /// Largest number of simultaneously active intervals
    pub max_active: usize,
}

impl ScanResult {
    /// Returns the registers handed out, in pool order.
    #[must_use]
    pub fn registers(&self, pool: &[Register]) -> Vec<Register> {
        pool.iter()
            .copied()
            .filter(|reg| {
                self.assignment
                    .values()
                    .any(|loc| *loc == Location::Register(*reg))
            })
            .collect()
    }

    /// Returns the synthetic registers assigned a slot.
    #[must_use]
    pub fn spilled(&self) -> usize {
        self.assignment
            .values()
            .filter(|loc| matches!(loc, Location::Slot(_)))
            .count()
    }
}

/// Computes the live interval of every synthetic register in `instructions`.
///
/// Intervals are returned ordered by start position, ties broken by register id.
#[must_use]
pub fn compute_intervals(instructions: &[Instruction]) -> Vec<LiveInterval> {
    let mut intervals: FxHashMap<SyntheticReg, LiveInterval> = FxHashMap::default();

    for (pos, instr) in instructions.iter().enumerate() {
        for reg in instr.synthetic_registers() {
            intervals
                .entry(reg)
                .or_insert_with(|| LiveInterval::new(reg, pos))
                .extend_end(pos);
        }
    }

    let mut sorted: Vec<LiveInterval> = intervals.into_values().collect();
    sorted.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.reg.cmp(&b.reg)));
    sorted
}

/// Assigns `pool` registers to `intervals` by linear scan.
///
/// Intervals are processed by increasing start. Active intervals whose end precedes the
/// current start are expired and their registers returned to the free pool. With a free
/// register the current interval takes the lowest one in pool order. Otherwise the active
/// interval with the furthest end is the spill candidate: if it outlives the current
/// interval, the current interval takes its register and the candidate moves to a new
/// slot, else the current interval gets the slot.
///
/// `intervals` must be sorted by start, as [`compute_intervals`] returns them.
#[must_use]
pub fn linear_scan(intervals: &[LiveInterval], pool: &[Register]) -> ScanResult {
    let mut result = ScanResult::default();
    let mut free: BTreeSet<usize> = (0..pool.len()).collect();
    // Indices into `intervals`, sorted by increasing end point, with their pool index
    let mut active: Vec<(usize, usize)> = Vec::new();

    for (index, interval) in intervals.iter().enumerate() {
        active.retain(|&(other, reg)| {
            if intervals[other].end < interval.start {
                free.insert(reg);
                false
            } else {
                true
            }
        });

        if let Some(reg) = free.pop_first() {
            result
                .assignment
                .insert(interval.reg, Location::Register(pool[reg]));
            insert_by_end(&mut active, intervals, index, reg);
        } else if let Some(&(victim, reg)) = active.last() {
            let slot = Location::Slot(result.slots);
            result.slots += 1;

            if intervals[victim].end > interval.end {
                result
                    .assignment
                    .insert(interval.reg, Location::Register(pool[reg]));
                result.assignment.insert(intervals[victim].reg, slot);
                active.pop();
                insert_by_end(&mut active, intervals, index, reg);
            } else {
                result.assignment.insert(interval.reg, slot);
            }
        } else {
            // Empty pool
            result.assignment.insert(interval.reg, Location::Slot(result.slots));
            result.slots += 1;
        }

        result.max_active = result.max_active.max(active.len());
    }

    result
}

fn insert_by_end(
    active: &mut Vec<(usize, usize)>,
    intervals: &[LiveInterval],
    index: usize,
    reg: usize,
) {
    let end = intervals[index].end;
    let at = active.partition_point(|&(other, _)| intervals[other].end <= end);
    active.insert(at, (index, reg));
}
