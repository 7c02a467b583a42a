//! Code transformation: expansion, scheduling and register allocation.
//!
//! This module provides the layer between analysis and relocation:
//!
//! - [`crate::analysis`] - control flow extraction, boundaries and hazard graphs
//! - [`compiler`](self) - expansion policies, list scheduling, register allocation and
//!   the pipeline driving them
//! - [`crate::relocation`] - segment growth, re-addressing and branch repair
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Transformer::run                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  RelocationEngine::analyze    Snapshot of the original layout    │
//! │                                                                  │
//! │  per function:                                                   │
//! │    ControlFlowGraph           Function subgraph and boundary     │
//! │    Activation records         Prologue/epilogue pinned           │
//! │    TransformPolicy            Original -> expanded sequence      │
//! │                                                                  │
//! │  per block (optionally on rayon):                                │
//! │    ListScheduler              Hazard-respecting reorder          │
//! │    RegisterAllocator          Synthetic -> physical registers    │
//! │      ├─ Naive                 Per-region save/restore            │
//! │      └─ LinearScan            Per-block intervals, spill slots   │
//! │                                                                  │
//! │  RelocationEngine::apply      Grow/move segments, fix branches   │
//! │                                                                  │
//! │  EventLog                     Change tracking and diagnostics    │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use mipsweave::compiler::{TransformConfig, Transformer};
//!
//! let report = Transformer::new(TransformConfig::linear_scan())
//!     .with_policy(my_policy)
//!     .run(&mut program, &mut image, &["main"])?;
//! println!("{}", report.summary());
//! ```

mod config;
mod events;
mod pipeline;
mod policy;
mod regalloc;
mod scheduler;

pub use config::{AllocationStrategy, TransformConfig};
pub use events::{Event, EventBuilder, EventKind, EventLog, TransformStats};
pub use pipeline::{TransformReport, Transformer};
pub use policy::{FnPolicy, Identity, TransformPolicy};
pub use regalloc::{
    compute_intervals, linear_scan, AllocationReport, LiveInterval, Location,
    RegisterAllocator, ScanResult,
};
pub use scheduler::{ListScheduler, SchedulingMetrics};
