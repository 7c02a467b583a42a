//! End-to-end rewriting pipeline.
//!
//! The [`Transformer`] is the main entry point for rewriting functions of a decoded
//! program. It orchestrates analysis, expansion, scheduling, register allocation and
//! relocation over a working copy of the program and image, and only commits the
//! result when every stage succeeded.

use std::time::Instant;

use rayon::prelude::*;

use crate::{
    analysis::{locate_activation_records, ControlFlowGraph},
    compiler::{
        events::{EventKind, EventLog, TransformStats},
        policy::{Identity, TransformPolicy},
        regalloc::{AllocationReport, RegisterAllocator},
        scheduler::ListScheduler,
        TransformConfig,
    },
    isa::{Instruction, LatencyModel, MipsLatencies},
    program::{BinaryImage, BlockId, Program},
    relocation::{RelocationEngine, RelocationReport},
    Result,
};

/// Main transformation driver.
///
/// A run performs, per requested function:
///
/// 1. **Extraction**: Function subgraph, boundary and activation records
/// 2. **Expansion**: The [`TransformPolicy`] replaces every transformable instruction
/// 3. **Scheduling**: Blocks are reordered by the [`ListScheduler`]
/// 4. **Allocation**: Synthetic registers are mapped by the [`RegisterAllocator`]
///
/// followed by one [`RelocationEngine`] pass over the whole image.
pub struct Transformer {
    config: TransformConfig,
    policy: Box<dyn TransformPolicy>,
    latencies: Box<dyn LatencyModel>,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(TransformConfig::default())
    }
}

/// Result of one block's scheduling and allocation.
struct BlockOutcome {
    block: BlockId,
    instructions: Vec<Instruction>,
    scheduled: bool,
    allocation: AllocationReport,
}

impl Transformer {
    /// Creates a transformer with the identity policy and the default MIPS timings.
    ///
    /// # Arguments
    ///
    /// * `config` - Run configuration
    #[must_use]
    pub fn new(config: TransformConfig) -> Self {
        Self {
            config,
            policy: Box::new(Identity),
            latencies: Box::new(MipsLatencies),
        }
    }

    /// Replaces the expansion policy.
    #[must_use]
    pub fn with_policy(mut self, policy: impl TransformPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Replaces the latency model used by the scheduler.
    #[must_use]
    pub fn with_latencies(mut self, latencies: impl LatencyModel + 'static) -> Self {
        self.latencies = Box::new(latencies);
        self
    }

    /// Returns the run configuration.
    #[must_use]
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Rewrites the named functions and repairs the address space.
    ///
    /// An empty `functions` slice selects every function of the program. Names listed
    /// twice are processed once.
    ///
    /// # Arguments
    ///
    /// * `program` - The decoded program, rewritten on success
    /// * `image` - Section and symbol metadata, updated on success
    /// * `functions` - Names of the functions to transform
    ///
    /// # Returns
    ///
    /// A [`TransformReport`] with the event log, the relocation outcome and the
    /// per-block allocation reports.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage. `program` and `image` are left untouched.
    pub fn run(
        &self,
        program: &mut Program,
        image: &mut BinaryImage,
        functions: &[&str],
    ) -> Result<TransformReport> {
        let start = Instant::now();
        self.config.validate()?;

        let mut work = program.clone();
        let mut work_image = image.clone();
        let events = EventLog::new();

        let engine = RelocationEngine::analyze(&work, &work_image)?
            .with_address_limit(self.config.address_limit);
        let cfg = ControlFlowGraph::from_program(&work)?;

        let mut names: Vec<String> = Vec::new();
        if functions.is_empty() {
            names.extend(work.functions().map(|(_, f)| f.name.clone()));
        } else {
            for name in functions {
                if !names.iter().any(|n| n == name) {
                    names.push((*name).to_string());
                }
            }
        }

        log::info!(
            "Transforming {} function(s) with policy '{}'",
            names.len(),
            self.policy.name()
        );

        let mut allocations = Vec::new();
        for name in &names {
            let reports = self
                .process_function(&mut work, &cfg, name, &events)
                .inspect_err(|e| log::error!("Transformation of '{}' failed: {}", name, e))?;
            allocations.extend(reports);
        }

        let relocation = engine.apply(&mut work, &mut work_image)?;
        events.merge(&relocation.events);

        *program = work;
        *image = work_image;

        let stats = TransformStats::from_log(&events).with_time(start.elapsed());
        log::info!("Transformation complete: {}", stats.summary());

        Ok(TransformReport {
            events,
            relocation,
            allocations,
            stats,
        })
    }

    fn process_function(
        &self,
        program: &mut Program,
        cfg: &ControlFlowGraph,
        name: &str,
        events: &EventLog,
    ) -> Result<Vec<(BlockId, AllocationReport)>> {
        events
            .record(EventKind::FunctionProcessingStarted)
            .function(name);

        let view = cfg.function_view(name, self.config.neighbor_degree)?;
        let boundary = view.locate_boundary()?;
        let records = locate_activation_records(program, boundary)?;
        if records.prologue.is_none() || records.epilogue.is_none() {
            log::warn!("Function '{}' has no complete activation record", name);
            events
                .record(EventKind::Warning)
                .function(name)
                .message("no complete activation record");
        }

        let blocks = view.transformable_blocks(program);
        for &block in &blocks {
            self.expand_block(program, block, name, events)?;
        }

        let inputs = blocks
            .iter()
            .map(|&id| {
                program
                    .block(id)
                    .map(|b| (id, b.instructions.clone()))
                    .ok_or_else(|| malformed_error!("Block {} vanished during expansion", id))
            })
            .collect::<Result<Vec<_>>>()?;

        let outcomes: Vec<Result<BlockOutcome>> = if self.config.parallel {
            inputs
                .into_par_iter()
                .map(|(id, instructions)| self.lower_block(id, instructions))
                .collect()
        } else {
            inputs
                .into_iter()
                .map(|(id, instructions)| self.lower_block(id, instructions))
                .collect()
        };

        let mut reports = Vec::new();
        for outcome in outcomes {
            let outcome = outcome?;
            let start = program.block(outcome.block).map_or(0, |b| b.start);

            if outcome.scheduled {
                events.record(EventKind::BlockScheduled).at(name, start);
            }
            if !outcome.allocation.is_empty() {
                events
                    .record(EventKind::RegistersAllocated)
                    .at(name, start)
                    .message(format!(
                        "{:?}, {} byte frame",
                        outcome.allocation.registers_used, outcome.allocation.frame_bytes
                    ));
                for _ in 0..outcome.allocation.spilled {
                    events.record(EventKind::RegisterSpilled).at(name, start);
                }
            }

            program.replace_instructions(outcome.block, outcome.instructions)?;
            reports.push((outcome.block, outcome.allocation));
        }

        events
            .record(EventKind::FunctionProcessingCompleted)
            .function(name);
        Ok(reports)
    }

    /// Splices the policy's expansion of every transformable instruction into `block`.
    ///
    /// Control transfers and everything from the last control transfer on stay as they
    /// are, so inserted code never lands in a delay slot.
    fn expand_block(
        &self,
        program: &mut Program,
        block: BlockId,
        name: &str,
        events: &EventLog,
    ) -> Result<()> {
        let current = program
            .block(block)
            .ok_or_else(|| malformed_error!("Block {} does not exist", block))?;
        let start = current.start;
        let terminator = current
            .instructions
            .iter()
            .rposition(|i| i.opcode.is_control_transfer())
            .unwrap_or(current.instructions.len());

        let mut expanded = Vec::with_capacity(current.len());
        let mut inserted = 0usize;
        let mut removed = 0usize;

        for (index, instr) in current.instructions.iter().enumerate() {
            if index >= terminator || !instr.transformable || instr.opcode.is_control_transfer()
            {
                expanded.push(instr.clone());
                continue;
            }

            let mut kept = false;
            for mut replacement in self.policy.expand(instr) {
                if !kept && same_operation(&replacement, instr) {
                    replacement.address = instr.address;
                    replacement.origin = instr.origin;
                    replacement.transformable = instr.transformable;
                    kept = true;
                } else {
                    replacement.address = 0;
                    replacement.origin = 0;
                    replacement.transformable = true;
                    inserted += 1;
                }
                expanded.push(replacement);
            }
            if !kept {
                removed += 1;
            }
        }

        if inserted == 0 && removed == 0 {
            return Ok(());
        }

        log::debug!(
            "Block {} of '{}': {} inserted, {} removed",
            block,
            name,
            inserted,
            removed
        );
        events
            .record(EventKind::InstructionsInserted)
            .at(name, start)
            .message(format!("{inserted} inserted, {removed} removed"));
        program.replace_instructions(block, expanded)?;
        Ok(())
    }

    fn lower_block(&self, block: BlockId, instructions: Vec<Instruction>) -> Result<BlockOutcome> {
        let ordered = if self.config.schedule {
            ListScheduler::new(&*self.latencies).reorder(&instructions)?
        } else {
            instructions.clone()
        };
        let scheduled = ordered != instructions;

        let (instructions, allocation) = if self.config.allocate {
            RegisterAllocator::new(&self.config).allocate(&ordered)?
        } else {
            if let Some(instr) = ordered.iter().find(|i| i.has_synthetic()) {
                return Err(malformed_error!(
                    "Allocation is disabled but '{}' in block {} names a synthetic register",
                    instr,
                    block
                ));
            }
            (ordered, AllocationReport::default())
        };

        Ok(BlockOutcome {
            block,
            instructions,
            scheduled,
            allocation,
        })
    }
}

fn same_operation(a: &Instruction, b: &Instruction) -> bool {
    a.opcode == b.opcode
        && a.dests == b.dests
        && a.sources == b.sources
        && a.immediate == b.immediate
}

/// Outcome of [`Transformer::run`].
#[derive(Debug, Clone)]
pub struct TransformReport {
    /// Every event of the run, relocation included
    pub events: EventLog,
    /// Layout changes
    pub relocation: RelocationReport,
    /// Allocation outcome per lowered block
    pub allocations: Vec<(BlockId, AllocationReport)>,
    /// Statistics derived from `events`
    pub stats: TransformStats,
}

impl TransformReport {
    /// Total number of synthetic registers that went to the stack.
    #[must_use]
    pub fn spilled(&self) -> usize {
        self.allocations.iter().map(|(_, r)| r.spilled).sum()
    }

    /// Allocation outcomes merged over all blocks.
    #[must_use]
    pub fn allocation(&self) -> AllocationReport {
        let mut total = AllocationReport::default();
        for (_, report) in &self.allocations {
            total.absorb(report.clone());
        }
        total
    }

    /// Returns a one-line summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        self.stats.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::FnPolicy,
        isa::{Opcode, Operand, Register, SyntheticReg, UnitLatencies},
        test::{create_image, create_program, F_ENTRY, F_EXIT},
        Error,
    };

    // Checks the loaded word against a second load and stores the difference.
    fn load_check_policy() -> FnPolicy<impl Fn(&Instruction) -> Vec<Instruction> + Send + Sync> {
        FnPolicy::new(|instr: &Instruction| {
            if instr.opcode == Opcode::Lw {
                let s = SyntheticReg(0);
                vec![
                    instr.clone(),
                    Instruction::lw(s, 0, Register::A0),
                    Instruction::alu(Opcode::Xor, s, s, Register::T0),
                    Instruction::sw(s, 0, Register::A1),
                ]
            } else {
                vec![instr.clone()]
            }
        })
    }

    #[test]
    fn test_identity_without_scheduling_is_noop() -> Result<()> {
        let (mut program, entry, _) = create_program();
        let mut image = create_image();
        let original = image.clone();

        let mut config = TransformConfig::new();
        config.schedule = false;
        let report = Transformer::new(config).run(&mut program, &mut image, &["f"])?;

        assert!(report.relocation.is_noop());
        assert!(report.relocation.address_map.is_empty());
        assert_eq!(image, original);
        let block = program.block(entry).unwrap();
        assert!(block.instructions.iter().all(|i| i.address == i.origin));
        // The prologue is pinned.
        assert!(!block.instructions[0].transformable);
        Ok(())
    }

    #[test]
    fn test_identity_schedules_load_early() -> Result<()> {
        let (mut program, entry, _) = create_program();
        let mut image = create_image();

        let report = Transformer::default().run(&mut program, &mut image, &["f"])?;

        let block = program.block(entry).unwrap();
        assert_eq!(block.instructions[1].opcode, Opcode::Lw);
        assert_eq!(block.instructions[1].address, F_ENTRY + 4);
        assert_eq!(block.instructions[1].origin, 0x400010);
        assert_eq!(report.stats.blocks_scheduled, 1);
        assert!(report.relocation.address_map.is_empty());
        Ok(())
    }

    #[test]
    fn test_inserted_code_relocates_text() -> Result<()> {
        let (mut program, entry, exit) = create_program();
        let mut image = create_image();

        let report = Transformer::default()
            .with_policy(load_check_policy())
            .run(&mut program, &mut image, &["f"])?;

        // 6 original + 3 inserted + 4 save/restore of the borrowed $t1.
        let block = program.block(entry).unwrap();
        assert_eq!(block.len(), 13);
        assert!(block.instructions.iter().all(|i| !i.has_synthetic()));
        assert_eq!(report.allocation().registers_used, vec![Register::T1]);

        let text = image.section(".text").unwrap();
        assert_eq!(text.address, 0x400100);
        assert_eq!(text.size, 0x40 + 28);

        assert_eq!(block.start, 0x400108);
        let exit_start = program.block(exit).unwrap().start;
        assert_eq!(exit_start, 0x400108 + 52);
        assert_eq!(report.relocation.address_map.translate(F_EXIT), exit_start);
        assert_eq!(block.terminator().unwrap().branch_target(), Some(exit_start));

        let f = image.symbols.by_name("f").unwrap();
        assert_eq!(f.value, 0x400108);
        assert_eq!(f.size, 36 + 28);

        assert_eq!(report.stats.blocks_expanded, 1);
        assert_eq!(report.stats.segments_relocated, 1);
        assert!(report.events.has(EventKind::FunctionProcessingCompleted));
        Ok(())
    }

    #[test]
    fn test_linear_scan_pipeline() -> Result<()> {
        let (mut program, entry, exit) = create_program();
        let mut image = create_image();

        Transformer::new(TransformConfig::linear_scan())
            .with_policy(load_check_policy())
            .run(&mut program, &mut image, &[])?;

        let block = program.block(entry).unwrap();
        assert!(block.instructions.iter().all(|i| !i.has_synthetic()));
        let exit_start = program.block(exit).unwrap().start;
        assert_eq!(block.terminator().unwrap().branch_target(), Some(exit_start));
        assert_eq!(block.end_address().map(|a| a + 4), Some(exit_start));
        Ok(())
    }

    #[test]
    fn test_failure_leaves_inputs_untouched() {
        let (mut program, _, _) = create_program();
        let mut image = create_image();
        let (program_before, image_before) = (program.clone(), image.clone());

        // Nine values live at once against a pool of eight.
        let policy = FnPolicy::new(|instr: &Instruction| {
            if instr.opcode != Opcode::Lw {
                return vec![instr.clone()];
            }
            let mut out = vec![instr.clone()];
            for id in 0..9 {
                out.push(Instruction::addiu(SyntheticReg(id), Register::Zero, i64::from(id)));
            }
            for id in 0..9 {
                out.push(Instruction::sw(SyntheticReg(id), i64::from(id) * 4, Register::A1));
            }
            out
        });

        let mut config = TransformConfig::new();
        config.schedule = false;
        let result = Transformer::new(config)
            .with_policy(policy)
            .run(&mut program, &mut image, &["f"]);

        assert!(matches!(
            result,
            Err(Error::RegisterPoolExhausted {
                needed: 9,
                available: 8
            })
        ));
        assert_eq!(program, program_before);
        assert_eq!(image, image_before);
    }

    #[test]
    fn test_naive_regions_reuse_synthetic_ids() -> Result<()> {
        let mut program = Program::new();
        let f = program.add_function("f");
        let block = program.add_block(
            f,
            F_ENTRY,
            crate::test::place(
                vec![
                    Instruction::addiu(Register::Sp, Register::Sp, -8),
                    Instruction::lw(Register::T0, 0, Register::A0),
                    Instruction::lw(Register::T1, 4, Register::A0),
                    Instruction::addiu(Register::Sp, Register::Sp, 8),
                    Instruction::jr(Register::Ra),
                    Instruction::nop(),
                ],
                F_ENTRY,
            ),
        )?;
        program.infer_edges()?;
        let mut image = create_image();

        // Every expansion names its temporary %s0.
        let policy = FnPolicy::new(|instr: &Instruction| {
            if instr.opcode != Opcode::Lw {
                return vec![instr.clone()];
            }
            let s = SyntheticReg(0);
            vec![
                instr.clone(),
                Instruction::addiu(s, Register::Zero, 1),
                Instruction::sw(s, 0, Register::A1),
            ]
        });

        let mut config = TransformConfig::naive();
        config.schedule = false;
        let report = Transformer::new(config)
            .with_policy(policy)
            .run(&mut program, &mut image, &["f"])?;

        let code = &program.block(block).unwrap().instructions;
        assert!(code.iter().all(|i| !i.has_synthetic()));
        // 6 original + 2 x (2 inserted + 4 save/restore)
        assert_eq!(code.len(), 18);
        assert_eq!(report.allocation().frames, 2);
        Ok(())
    }

    #[test]
    fn test_policy_sees_only_body_instructions() -> Result<()> {
        let (mut program, _, _) = create_program();
        let mut image = create_image();

        let offered = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = std::sync::Arc::clone(&offered);
        let policy = FnPolicy::new(move |instr: &Instruction| {
            seen.lock().unwrap().push(instr.origin);
            vec![instr.clone()]
        });

        let mut config = TransformConfig::new();
        config.schedule = false;
        Transformer::new(config)
            .with_policy(policy)
            .run(&mut program, &mut image, &["f"])?;

        // Prologue, branch, delay slot, epilogue, return and its slot are never offered.
        let mut offered = offered.lock().unwrap().clone();
        offered.sort_unstable();
        assert_eq!(offered, vec![0x40000c, 0x400010, 0x400014]);
        Ok(())
    }

    #[test]
    fn test_unknown_function() {
        let (mut program, _, _) = create_program();
        let mut image = create_image();
        let err = Transformer::default()
            .run(&mut program, &mut image, &["missing"])
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_unallocated_synthetics_rejected() {
        let (mut program, _, _) = create_program();
        let mut image = create_image();
        let mut config = TransformConfig::new();
        config.allocate = false;
        let result = Transformer::new(config)
            .with_policy(load_check_policy())
            .run(&mut program, &mut image, &["f"]);
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_deleting_policy_shrinks_block() -> Result<()> {
        let (mut program, entry, exit) = create_program();
        let mut image = create_image();
        let policy = FnPolicy::new(|instr: &Instruction| {
            if instr.opcode == Opcode::Addu && instr.sources[0] == Operand::Reg(Register::A0) {
                Vec::new()
            } else {
                vec![instr.clone()]
            }
        });

        let report = Transformer::default()
            .with_policy(policy)
            .with_latencies(UnitLatencies)
            .run(&mut program, &mut image, &["f"])?;

        assert_eq!(program.block(entry).unwrap().len(), 5);
        assert_eq!(program.block(exit).unwrap().start, F_EXIT - 4);
        assert_eq!(report.events.count_kind(EventKind::InstructionsInserted), 1);
        Ok(())
    }

    #[test]
    fn test_parallel_matches_sequential() -> Result<()> {
        let (mut sequential, _, _) = create_program();
        let mut sequential_image = create_image();
        Transformer::default()
            .with_policy(load_check_policy())
            .run(&mut sequential, &mut sequential_image, &["f"])?;

        let (mut parallel, _, _) = create_program();
        let mut parallel_image = create_image();
        Transformer::new(TransformConfig::new().with_parallel(true))
            .with_policy(load_check_policy())
            .run(&mut parallel, &mut parallel_image, &["f", "f"])?;

        assert_eq!(sequential, parallel);
        assert_eq!(sequential_image, parallel_image);
        Ok(())
    }
}
