//! Per-function sample counts over time
//!
//! The sample time range is cut into fixed-width buckets. A qualifying sample
//! adds self and inclusive counts to its function in its bucket, and an
//! inclusive count to each distinct ancestor.
//!
//! Only buckets that received a qualifying sample are stored. The bucket count
//! still covers the whole range, so a single far-off timestamp costs nothing.

use super::qualifying_samples;
use crate::domain::{FunctionId, Timestamp};
use crate::format::Record;
use crate::symbolization::FunctionTable;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatCell {
    pub self_samples: u64,
    pub inclusive_samples: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatMap {
    /// Timestamp of the earliest sample
    pub start_time: Timestamp,
    pub bucket_width_ms: u64,
    /// `1 + range_ms / bucket_width_ms`, or 0 without samples
    pub bucket_count: u64,
    /// Non-empty buckets keyed by index
    pub buckets: BTreeMap<u64, BTreeMap<FunctionId, HeatCell>>,
}

impl HeatMap {
    #[must_use]
    pub fn cell(&self, bucket: u64, function: FunctionId) -> Option<&HeatCell> {
        self.buckets.get(&bucket)?.get(&function)
    }

    #[must_use]
    pub fn bucket_count(&self) -> u64 {
        self.bucket_count
    }

    /// Cells of one bucket; empty for buckets no qualifying sample reached
    pub fn bucket(&self, index: u64) -> impl Iterator<Item = (FunctionId, &HeatCell)> {
        self.buckets.get(&index).into_iter().flatten().map(|(&id, cell)| (id, cell))
    }
}

pub struct HeatMapBuilder<'a> {
    functions: &'a FunctionTable,
    bucket_width_ms: u64,
}

impl<'a> HeatMapBuilder<'a> {
    #[must_use]
    pub fn new(functions: &'a FunctionTable, bucket_width_ms: u64) -> Self {
        Self { functions, bucket_width_ms: bucket_width_ms.max(1) }
    }

    #[must_use]
    pub fn build(&self, records: &[Record]) -> HeatMap {
        let bucket_width_ms = self.bucket_width_ms;
        let width_ns = bucket_width_ms.saturating_mul(1_000_000);

        let times = records.iter().filter(|r| r.as_sample().is_some()).map(|r| r.common.time);
        let (Some(min), Some(max)) = (times.clone().min(), times.max()) else {
            return HeatMap { bucket_width_ms, ..HeatMap::default() };
        };

        let range_ms = max.millis_since(min);
        let bucket_count = 1 + range_ms / bucket_width_ms;
        let mut buckets: BTreeMap<u64, BTreeMap<FunctionId, HeatCell>> = BTreeMap::new();

        for sample in qualifying_samples(records, self.functions) {
            let index = (sample.time.0.saturating_sub(min.0) / width_ns).min(bucket_count - 1);
            let bucket = buckets.entry(index).or_default();

            bucket.entry(sample.function).or_default().self_samples += 1;
            for id in sample.distinct_frames() {
                bucket.entry(id).or_default().inclusive_samples += 1;
            }
        }

        HeatMap { start_time: min, bucket_width_ms, bucket_count, buckets }
    }
}
