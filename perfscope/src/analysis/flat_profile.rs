//! Flat per-function profile
//!
//! One row per function table entry:
//!
//! - **self time**: samples taken while the function itself was executing
//! - **inclusive time**: samples where the function was executing or on the
//!   call chain, counted once per sample even under recursion
//! - **call count**: sampled occurrences, later raised by the call graph for
//!   every observed call into the function
//!
//! Self percentages are relative to total self time; inclusive percentages
//! are relative to the largest inclusive time, so the outermost frame reads
//! close to 100%.

// Percentage calculations intentionally convert u64 to f64
#![allow(clippy::cast_precision_loss)]

use super::qualifying_samples;
use crate::domain::FunctionId;
use crate::format::Record;
use crate::symbolization::FunctionTable;
use serde::Serialize;

/// Lower bound for percentage denominators
const MIN_DENOMINATOR: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatProfileRecord {
    pub function_id: FunctionId,
    pub call_count: u64,
    pub self_time: u64,
    /// Share of total self time (0.0 - 100.0)
    pub self_time_pct: f64,
    pub inclusive_time: u64,
    /// Share of the largest inclusive time (0.0 - 100.0)
    pub inclusive_time_pct: f64,
}

impl FlatProfileRecord {
    fn empty(function_id: FunctionId) -> Self {
        Self {
            function_id,
            call_count: 0,
            self_time: 0,
            self_time_pct: 0.0,
            inclusive_time: 0,
            inclusive_time_pct: 0.0,
        }
    }
}

/// Flat profile rows, indexed by [`FunctionId`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FlatProfile {
    rows: Vec<FlatProfileRecord>,
}

impl FlatProfile {
    #[must_use]
    pub fn get(&self, id: FunctionId) -> Option<&FlatProfileRecord> {
        self.rows.get(id.index())
    }

    #[must_use]
    pub fn rows(&self) -> &[FlatProfileRecord] {
        &self.rows
    }

    /// Rows ordered by self time, highest first; ties keep function order
    #[must_use]
    pub fn by_self_time(&self) -> Vec<&FlatProfileRecord> {
        let mut rows: Vec<&FlatProfileRecord> = self.rows.iter().collect();
        rows.sort_by(|a, b| b.self_time.cmp(&a.self_time));
        rows
    }

    /// Total self time across all functions (the number of qualifying samples)
    #[must_use]
    pub fn total_self_time(&self) -> u64 {
        self.rows.iter().map(|row| row.self_time).sum()
    }

    /// Record one call into `id`
    pub(crate) fn add_call(&mut self, id: FunctionId) {
        if let Some(row) = self.rows.get_mut(id.index()) {
            row.call_count += 1;
        }
    }

    fn compute_percentages(&mut self) {
        let total_self = (self.total_self_time() as f64).max(MIN_DENOMINATOR);
        let max_inclusive = self
            .rows
            .iter()
            .map(|row| row.inclusive_time)
            .max()
            .map_or(MIN_DENOMINATOR, |max| (max as f64).max(MIN_DENOMINATOR));

        for row in &mut self.rows {
            row.self_time_pct = row.self_time as f64 / total_self * 100.0;
            row.inclusive_time_pct = row.inclusive_time as f64 / max_inclusive * 100.0;
        }
    }
}

pub struct FlatProfileBuilder<'a> {
    functions: &'a FunctionTable,
}

impl<'a> FlatProfileBuilder<'a> {
    #[must_use]
    pub fn new(functions: &'a FunctionTable) -> Self {
        Self { functions }
    }

    /// Single pass over time-ordered records
    #[must_use]
    pub fn build(&self, records: &[Record]) -> FlatProfile {
        let mut profile = FlatProfile {
            rows: self.functions.iter().map(|(id, _)| FlatProfileRecord::empty(id)).collect(),
        };

        for sample in qualifying_samples(records, self.functions) {
            if let Some(row) = profile.rows.get_mut(sample.function.index()) {
                row.self_time += 1;
                row.call_count += 1;
            }
            for id in sample.distinct_frames() {
                if let Some(row) = profile.rows.get_mut(id.index()) {
                    row.inclusive_time += 1;
                }
            }
        }

        profile.compute_percentages();
        profile
    }
}
