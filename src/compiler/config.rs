//! Configuration for the rewriting pipeline.
//!
//! [`TransformConfig`] groups every tunable of a [`Transformer`](crate::compiler::Transformer)
//! run. Defaults target a classic MIPS32 o32 calling convention: the eight `$t`
//! temporaries form the scratch pool, `$t8`/`$t9` are reserved for spill code and `$at`
//! carries the accumulator halves during save/restore.

use crate::{isa::Register, Result};

/// How synthetic registers are mapped onto physical registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AllocationStrategy {
    /// Per-region allocation with save/restore around each region, no spilling
    #[default]
    Naive,
    /// Interval-based allocation per block, spilling to stack slots when the pool runs out
    LinearScan,
}

/// Configuration for a transformation run.
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Register allocation strategy (default: [`AllocationStrategy::Naive`]).
    pub strategy: AllocationStrategy,

    /// Physical registers synthetic registers are drawn from (default: `$t0..$t7`).
    pub scratch_pool: Vec<Register>,

    /// Registers reserved by linear scan to reload and store spilled values
    /// (default: `$t8`, `$t9`).
    pub spill_temporaries: [Register; 2],

    /// Register used to move `hi`/`lo` to and from the stack (default: `$at`).
    pub accumulator_temp: Register,

    /// Rounds of neighbor widening when extracting a function subgraph (default: 0).
    pub neighbor_degree: usize,

    /// Exclusive upper bound of the address space segments may be placed in
    /// (default: `0x8000_0000`, the end of the MIPS user segment).
    pub address_limit: u64,

    /// Reorder instructions with the list scheduler (default: true).
    pub schedule: bool,

    /// Allocate synthetic registers (default: true).
    ///
    /// When disabled, synthetic registers must not appear in the expanded code.
    pub allocate: bool,

    /// Schedule and allocate the blocks of a function on the rayon thread pool
    /// (default: false). Relocation always runs on the calling thread.
    pub parallel: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            strategy: AllocationStrategy::Naive,
            scratch_pool: Register::TEMPORARIES.to_vec(),
            spill_temporaries: [Register::T8, Register::T9],
            accumulator_temp: Register::At,
            neighbor_degree: 0,
            address_limit: 0x8000_0000,
            schedule: true,
            allocate: true,
            parallel: false,
        }
    }
}

impl TransformConfig {
    /// Creates a new configuration with default settings.
    ///
    /// # Returns
    ///
    /// A new `TransformConfig` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration using the naive region allocator.
    #[must_use]
    pub fn naive() -> Self {
        Self::default()
    }

    /// Creates a configuration using the linear-scan allocator.
    #[must_use]
    pub fn linear_scan() -> Self {
        Self {
            strategy: AllocationStrategy::LinearScan,
            ..Self::default()
        }
    }

    /// Replaces the scratch pool.
    #[must_use]
    pub fn with_pool(mut self, pool: impl IntoIterator<Item = Register>) -> Self {
        self.scratch_pool = pool.into_iter().collect();
        self
    }

    /// Sets the upper address bound for segment placement.
    #[must_use]
    pub fn with_address_limit(mut self, limit: u64) -> Self {
        self.address_limit = limit;
        self
    }

    /// Enables or disables parallel per-block processing.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Checks the register assignment for conflicts.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the pool is empty, names a register twice,
    /// or contains `$zero`, `$sp`, a spill temporary or the accumulator temporary. The
    /// spill temporaries must also be distinct from each other and from the accumulator
    /// temporary, and none of them may be `$zero` or `$sp`.
    pub fn validate(&self) -> Result<()> {
        if self.scratch_pool.is_empty() {
            return Err(malformed_error!("Scratch register pool is empty"));
        }

        for (index, reg) in self.scratch_pool.iter().enumerate() {
            if self.scratch_pool[..index].contains(reg) {
                return Err(malformed_error!("Register {} appears twice in the pool", reg));
            }
            if reg.is_zero() || reg.is_stack_pointer() {
                return Err(malformed_error!("Register {} cannot be allocated", reg));
            }
            if self.spill_temporaries.contains(reg) || *reg == self.accumulator_temp {
                return Err(malformed_error!(
                    "Register {} is both in the pool and reserved",
                    reg
                ));
            }
        }

        let reserved = [
            self.spill_temporaries[0],
            self.spill_temporaries[1],
            self.accumulator_temp,
        ];
        for (index, reg) in reserved.iter().enumerate() {
            if reg.is_zero() || reg.is_stack_pointer() {
                return Err(malformed_error!("Register {} cannot be reserved", reg));
            }
            if reserved[..index].contains(reg) {
                return Err(malformed_error!("Register {} is reserved twice", reg));
            }
        }

        if self.address_limit == 0 {
            return Err(malformed_error!("Address limit must be above zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransformConfig::new();
        assert_eq!(config.strategy, AllocationStrategy::Naive);
        assert_eq!(config.scratch_pool.len(), 8);
        assert_eq!(config.address_limit, 0x8000_0000);
        assert!(config.schedule && config.allocate && !config.parallel);
        assert!(config.validate().is_ok());
        assert!(TransformConfig::linear_scan().validate().is_ok());
    }

    #[test]
    fn test_rejects_conflicts() {
        assert!(TransformConfig::new().with_pool([]).validate().is_err());
        assert!(TransformConfig::new()
            .with_pool([Register::T0, Register::T0])
            .validate()
            .is_err());
        assert!(TransformConfig::new()
            .with_pool([Register::T0, Register::Sp])
            .validate()
            .is_err());
        assert!(TransformConfig::new()
            .with_pool([Register::T0, Register::T8])
            .validate()
            .is_err());
        assert!(TransformConfig::new()
            .with_pool([Register::At])
            .validate()
            .is_err());

        let mut config = TransformConfig::new();
        config.accumulator_temp = Register::T9;
        assert!(config.validate().is_err());
    }
}
