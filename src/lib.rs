// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

//! # mipsweave
//!
//! A binary-level rewriting framework for MIPS32 executables. `mipsweave` takes a
//! decoded program, lets a policy insert instructions into chosen functions, and turns
//! the result back into a consistent image: instructions are rescheduled around their
//! hazards, inserted temporaries get physical registers, and code segments that grew are
//! moved with every branch, symbol and file offset repaired.
//!
//! ## Features
//!
//! - **Function extraction** - per-function control flow subgraphs with optional neighbor
//!   widening, unique entry/exit detection and stack frame discovery
//! - **Hazard graphs** - RAW, WAR and WAW dependencies over registers, `hi`/`lo` and
//!   memory, with control transfers and pinned instructions as barriers
//! - **List scheduling** - critical-path-first ordering with pluggable latency tables
//! - **Register allocation** - naive per-region save/restore or linear scan with spilling
//! - **Relocation** - in-place growth or first-fit segment moves, branch retargeting with
//!   reach checks, symbol and file offset fixup
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mipsweave::prelude::*;
//!
//! let mut image = BinaryImage::from_path("target.elf")?;
//! let mut program = decode(&image)?; // supplied by the caller's decoder
//!
//! let policy = FnPolicy::new(|instr: &Instruction| {
//!     if instr.class() == OpClass::Store {
//!         vec![instr.clone(), instr.clone()]
//!     } else {
//!         vec![instr.clone()]
//!     }
//! });
//!
//! let report = Transformer::new(TransformConfig::linear_scan())
//!     .with_policy(policy)
//!     .run(&mut program, &mut image, &["main"])?;
//! println!("{}", report.summary());
//! # Ok::<(), mipsweave::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`isa`] - registers, opcodes, instructions and timing tables
//! - [`program`] - the decoded program arena and the image metadata
//! - [`analysis`] - control flow and hazard analysis
//! - [`compiler`] - policies, scheduling, allocation and the [`compiler::Transformer`]
//! - [`relocation`] - address space repair after a transformation
//! - [`Error`] and [`Result`] - error handling
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Result`]. A failed [`compiler::Transformer::run`]
//! leaves the program and image it was given untouched; all work happens on copies.
//! Only [`Error::NotFound`] is recoverable in the sense of [`Error::is_fatal`].

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,ignore
/// use mipsweave::prelude::*;
///
/// let config = TransformConfig::linear_scan().with_parallel(true);
/// let transformer = Transformer::new(config);
/// ```
pub mod prelude;

/// MIPS32 instruction set model
///
/// # Key Types
///
/// - [`isa::Instruction`] - a decoded or inserted instruction
/// - [`isa::Register`] / [`isa::SyntheticReg`] - physical and placeholder registers
/// - [`isa::LatencyModel`] - timing lookups for the scheduler
pub mod isa;

/// Decoded programs and binary image metadata
pub mod program;

/// Control flow and hazard analysis
pub mod analysis;

/// Expansion, scheduling, register allocation and the transformation pipeline
pub mod compiler;

/// Address space repair after a transformation
pub mod relocation;

/// Generic utilities shared by the analyses
pub mod utils;

/// `mipsweave` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `mipsweave` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust,ignore
/// use mipsweave::Error;
///
/// match transformer.run(&mut program, &mut image, &["main"]) {
///     Ok(report) => println!("{}", report.summary()),
///     Err(Error::RegisterPoolExhausted { needed, available }) => {
///         println!("need {needed} registers, pool has {available}")
///     }
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;
