//! Priority-based list scheduling of basic blocks.
//!
//! The [`ListScheduler`] reorders the instructions of one block into a sequence that
//! respects every edge of the block's [`HazardGraph`] and hides latency by issuing
//! instructions on the critical path as early as possible.
//!
//! # Metrics
//!
//! For every node `v` of the hazard graph, with `lat(v)` looked up in a
//! [`LatencyModel`] (0 for the synthetic entry and exit):
//!
//! - `EST(v)` = 0 without predecessors, else `max(EST(p) + lat(p))` over predecessors
//! - `LST(v)` = `EST(exit)` without successors, else `min(LST(s) - lat(v))` over successors
//! - `slack(v)` = `LST(v) - EST(v)`; zero slack marks the critical path
//! - `max_delay_to_leaf(v)` = 0 without successors, else `max(lat(v) + max_delay_to_leaf(s))`
//!
//! # Priority
//!
//! Among the ready instructions (all predecessors emitted) the scheduler picks, in order
//! of precedence: critical before non-critical, lower EST, lower slack, higher
//! max-delay-to-leaf, higher execution time and finally lower original position. The
//! last rule makes the output deterministic.

use std::cmp::Ordering;

use crate::{
    analysis::{DependencyGraphBuilder, HazardGraph},
    isa::{Instruction, LatencyModel},
    program::{BlockId, Program},
    utils::graph::{algorithms, NodeId},
    Error, Result,
};

/// Timing metrics of one instruction within its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulingMetrics {
    /// Earliest start time
    pub est: u32,
    /// Latest start time that does not delay the block
    pub lst: u32,
    /// `lst - est`
    pub slack: u32,
    /// Longest latency-weighted path to a leaf
    pub max_delay_to_leaf: u32,
    /// Execution time estimate of the opcode
    pub execution_time: u32,
}

impl SchedulingMetrics {
    /// Returns `true` for instructions on the critical path.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.slack == 0
    }
}

/// Reorders block instructions by list scheduling over the hazard graph.
pub struct ListScheduler<'a> {
    latencies: &'a dyn LatencyModel,
}

impl<'a> ListScheduler<'a> {
    /// Creates a scheduler using `latencies` for timing lookups.
    #[must_use]
    pub fn new(latencies: &'a dyn LatencyModel) -> Self {
        ListScheduler { latencies }
    }

    /// Computes the metrics of every instruction.
    ///
    /// # Arguments
    ///
    /// * `graph` - The hazard graph of `instructions`
    /// * `instructions` - The block's instructions in program order
    ///
    /// # Returns
    ///
    /// One [`SchedulingMetrics`] per instruction, indexed by program position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the graph was built for a different instruction
    /// count and [`Error::GraphError`] if the graph has a cycle.
    pub fn metrics(
        &self,
        graph: &HazardGraph,
        instructions: &[Instruction],
    ) -> Result<Vec<SchedulingMetrics>> {
        let all = self.node_metrics(graph, instructions)?;
        Ok((0..instructions.len())
            .filter_map(|index| graph.node_of(index))
            .map(|node| all[node.index()])
            .collect())
    }

    /// Returns a hazard-respecting order of the instruction positions.
    ///
    /// # Errors
    ///
    /// See [`ListScheduler::metrics`].
    pub fn schedule(
        &self,
        graph: &HazardGraph,
        instructions: &[Instruction],
    ) -> Result<Vec<usize>> {
        let metrics = self.node_metrics(graph, instructions)?;
        let dag = graph.graph();

        let position = |node: NodeId| match graph.index_of(node) {
            Some(index) => index + 1,
            None if node == graph.entry() => 0,
            None => usize::MAX,
        };

        let mut waiting: Vec<usize> = dag.node_ids().map(|n| dag.in_degree(n)).collect();
        let mut ready: Vec<NodeId> = dag.entry_nodes().collect();
        let mut order = Vec::with_capacity(instructions.len());

        while !ready.is_empty() {
            let mut best = 0;
            for candidate in 1..ready.len() {
                let a = ready[candidate];
                let b = ready[best];
                let cmp = priority(&metrics[a.index()], &metrics[b.index()])
                    .then_with(|| position(b).cmp(&position(a)));
                if cmp == Ordering::Greater {
                    best = candidate;
                }
            }
            let node = ready.swap_remove(best);

            if let Some(index) = graph.index_of(node) {
                order.push(index);
            }
            for succ in dag.successors(node) {
                let count = &mut waiting[succ.index()];
                *count -= 1;
                if *count == 0 {
                    ready.push(succ);
                }
            }
        }

        if order.len() != instructions.len() {
            return Err(Error::GraphError(format!(
                "Scheduled {} of {} instructions",
                order.len(),
                instructions.len()
            )));
        }
        Ok(order)
    }

    /// Builds the hazard graph of `instructions` and returns them in scheduled order.
    ///
    /// # Errors
    ///
    /// Propagates graph construction and scheduling errors.
    pub fn reorder(&self, instructions: &[Instruction]) -> Result<Vec<Instruction>> {
        let graph = DependencyGraphBuilder::new().build(instructions)?;
        let order = self.schedule(&graph, instructions)?;
        Ok(order
            .into_iter()
            .map(|index| instructions[index].clone())
            .collect())
    }

    /// Schedules one block of `program` and swaps in the reordered instruction list.
    ///
    /// # Returns
    ///
    /// `true` if the order changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the block does not exist and propagates scheduling
    /// errors.
    pub fn schedule_block(&self, program: &mut Program, block: BlockId) -> Result<bool> {
        let current = program.block_mut(block)?;
        let reordered = self.reorder(&current.instructions)?;
        let changed = reordered != current.instructions;
        if changed {
            log::debug!("Rescheduled block {} ({} instructions)", block, reordered.len());
            program.replace_instructions(block, reordered)?;
        }
        Ok(changed)
    }

    /// Metrics for every graph node, indexed by node id.
    fn node_metrics(
        &self,
        graph: &HazardGraph,
        instructions: &[Instruction],
    ) -> Result<Vec<SchedulingMetrics>> {
        if graph.instruction_count() != instructions.len() {
            return Err(malformed_error!(
                "Hazard graph covers {} instructions, block has {}",
                graph.instruction_count(),
                instructions.len()
            ));
        }

        let dag = graph.graph();
        let topo = algorithms::topological_sort(dag)
            .ok_or_else(|| Error::GraphError("Hazard graph has a cycle".to_string()))?;

        let latency = |node: NodeId| {
            graph
                .index_of(node)
                .map_or(0, |index| self.latencies.latency(instructions[index].opcode))
        };

        let mut metrics = vec![SchedulingMetrics::default(); dag.node_count()];

        for &node in &topo {
            let est = dag
                .predecessors(node)
                .map(|p| metrics[p.index()].est + latency(p))
                .max()
                .unwrap_or(0);
            let execution_time = graph.index_of(node).map_or(0, |index| {
                self.latencies.execution_time(instructions[index].opcode)
            });
            metrics[node.index()].est = est;
            metrics[node.index()].execution_time = execution_time;
        }

        let horizon = metrics[graph.exit().index()].est;
        for &node in topo.iter().rev() {
            let own = latency(node);
            let lst = dag
                .successors(node)
                .map(|s| metrics[s.index()].lst.saturating_sub(own))
                .min()
                .unwrap_or(horizon);
            let delay = dag
                .successors(node)
                .map(|s| own + metrics[s.index()].max_delay_to_leaf)
                .max()
                .unwrap_or(0);

            let entry = &mut metrics[node.index()];
            entry.lst = lst;
            entry.slack = lst.saturating_sub(entry.est);
            entry.max_delay_to_leaf = delay;
        }

        Ok(metrics)
    }
}

/// Compares two ready candidates; `Greater` means `a` goes first.
fn priority(a: &SchedulingMetrics, b: &SchedulingMetrics) -> Ordering {
    a.is_critical()
        .cmp(&b.is_critical())
        .then_with(|| b.est.cmp(&a.est))
        .then_with(|| b.slack.cmp(&a.slack))
        .then_with(|| a.max_delay_to_leaf.cmp(&b.max_delay_to_leaf))
        .then_with(|| a.execution_time.cmp(&b.execution_time))
}
