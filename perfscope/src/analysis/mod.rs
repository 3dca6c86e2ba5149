//! Aggregations over the decoded sample stream
//!
//! Every builder walks the same time-ordered records and keys its output by
//! [`FunctionId`]. Only *qualifying* samples count: those whose instruction
//! pointer resolves to a non-kernel function. Each qualifying sample weighs
//! one unit, whatever its sampling period.
//!
//! - [`flat_profile`]: self and inclusive counts per function
//! - [`call_graph`]: caller → callee edge weights
//! - [`call_tree`]: pruned forest of call paths
//! - [`heat_map`]: per-function counts in fixed time buckets

pub mod call_graph;
pub mod call_tree;
pub mod flat_profile;
pub mod heat_map;

pub use call_graph::{CallGraph, CallGraphBuilder, CallGraphEdge};
pub use call_tree::{CallTree, CallTreeBuilder, CallTreeNode, NodeId};
pub use flat_profile::{FlatProfile, FlatProfileBuilder, FlatProfileRecord};
pub use heat_map::{HeatCell, HeatMap, HeatMapBuilder};

use crate::domain::{FunctionId, Timestamp};
use crate::format::Record;
use crate::symbolization::FunctionTable;

/// A sample whose instruction pointer resolved to a user-space function
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QualifiedSample {
    pub time: Timestamp,
    /// Function executing when the sample was taken
    pub function: FunctionId,
    /// Resolved non-kernel ancestors, innermost first
    pub ancestors: Vec<FunctionId>,
}

impl QualifiedSample {
    /// Sampled function followed by its ancestors, innermost first
    pub fn frames(&self) -> impl Iterator<Item = FunctionId> + '_ {
        std::iter::once(self.function).chain(self.ancestors.iter().copied())
    }

    /// Sampled function and every ancestor, each listed once
    pub fn distinct_frames(&self) -> Vec<FunctionId> {
        let mut seen = Vec::with_capacity(self.ancestors.len() + 1);
        for id in self.frames() {
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }
}

/// Qualifying samples in record order
pub(crate) fn qualifying_samples<'a>(
    records: &'a [Record],
    functions: &'a FunctionTable,
) -> impl Iterator<Item = QualifiedSample> + 'a {
    records.iter().filter_map(move |record| {
        let sample = record.as_sample()?;
        let function = functions.resolve_user(sample.ip)?;
        let ancestors =
            sample.ancestors().filter_map(|addr| functions.resolve_user(addr)).collect();
        Some(QualifiedSample { time: record.common.time, function, ancestors })
    })
}
