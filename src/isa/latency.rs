//! Instruction timing tables.
//!
//! The list scheduler never hard-codes timings; it asks a [`LatencyModel`]. The crate
//! ships [`MipsLatencies`], a table for a classic single-issue MIPS32 pipeline, and
//! tests or callers targeting another core supply their own.

use crate::isa::{OpClass, Opcode};

/// Per-opcode timing lookup used by the list scheduler.
pub trait LatencyModel: Send + Sync {
    /// Cycles until the result of `opcode` is available to a dependent instruction.
    fn latency(&self, opcode: Opcode) -> u32;

    /// Cycles `opcode` occupies its functional unit.
    ///
    /// Used as a scheduling tie-breaker; defaults to the latency.
    fn execution_time(&self, opcode: Opcode) -> u32 {
        self.latency(opcode)
    }
}

/// Default MIPS32 timing table.
///
/// Loads take two cycles (one load delay slot), multiplies five, divides 35; every
/// other instruction completes in one cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct MipsLatencies;

impl LatencyModel for MipsLatencies {
    fn latency(&self, opcode: Opcode) -> u32 {
        match opcode {
            Opcode::Mult | Opcode::Multu => 5,
            Opcode::Div | Opcode::Divu => 35,
            _ => match opcode.class() {
                OpClass::Load => 2,
                _ => 1,
            },
        }
    }
}

/// A latency model where every instruction takes one cycle.
///
/// With uniform latencies the scheduler degenerates to a hazard-respecting order that
/// stays as close to program order as the dependencies allow.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitLatencies;

impl LatencyModel for UnitLatencies {
    fn latency(&self, _opcode: Opcode) -> u32 {
        1
    }
}
