//! Report export
//!
//! Writes every view of a loaded session as a single JSON document:
//!
//! ```text
//! {
//!   "tool": "perfscope", "version": "…",
//!   "functions":   [{ "id", "address", "classId", "name", "kind" }],
//!   "flatProfile": [{ "functionId", "callCount", "selfTime", "selfTimePct", … }],
//!   "callGraph":   [{ "caller", "callee", "weight" }],
//!   "callTree":    [{ "functionId", "inclusiveTime", …, "children": [ … ] }],
//!   "heatMap":     { "startTime", "bucketWidthMs", "bucketCount",
//!                    "buckets": { "<index>": { "<functionId>": { … } } } }
//! }
//! ```

pub mod json_report;

pub use json_report::ReportExporter;
