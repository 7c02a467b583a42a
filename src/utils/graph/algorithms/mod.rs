//! Graph algorithms used by the rewriting pipeline.
//!
//! - [`topological_sort`] / [`is_topological_order`] - ordering of hazard graphs
//! - [`has_cycle`] / [`is_acyclic`] - DAG verification and loop detection

mod cycles;
mod topological;

pub use cycles::{has_cycle, is_acyclic};
pub use topological::{is_topological_order, topological_sort};
