//! # perfscope - perf.data profile analyzer
//!
//! Decodes Linux `perf record` files (format version 2, magic `PERFILE2`) and
//! turns raw instruction-pointer samples into profiling views: a flat
//! per-function profile, a weighted call graph, a pruned call tree and a
//! time-bucketed heat map.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         perf.data file                          │
//! │   header │ attributes │ event types │ data (MMAP, COMM, SAMPLE…) │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ format::FileParser
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 time-ordered typed records                      │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ symbolization::SymbolResolver
//!                         │   nm <binary>, /proc/kallsyms,
//!                         │   debug libraries, host lines
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                FunctionTable (hit functions only)               │
//! └──────┬──────────────┬───────────────┬───────────────┬──────────┘
//!        ▼              ▼               ▼               ▼
//!   flat profile    call graph      call tree        heat map
//!        └──────────────┴───────┬───────┴───────────────┘
//!                               ▼
//!                  session::ProfileSession ──▶ export (JSON), cli (text)
//! ```
//!
//! ## Module Structure
//!
//! - [`format`]: binary decoding of the perf file
//!   - `sample_extractor`: bitmask-driven sample payload decode
//!   - `parser`: section validation and record stream
//! - [`symbolization`]: symbol sources, address-sorted tables, placeholders
//!   for unmapped addresses
//! - [`analysis`]: the four aggregate views
//! - [`session`]: builder and accessors for one loaded file
//! - [`export`]: JSON report
//! - [`cli`]: argument parsing and text rendering
//! - [`config`], [`logging`]: per-session configuration and log sink
//! - [`domain`]: newtypes and error types
//!
//! ## Typical Usage
//!
//! ```rust,ignore
//! use perfscope::session::ProfileSession;
//!
//! let session = ProfileSession::builder()
//!     .binary("./myapp")
//!     .load(Path::new("perf.data"))?;
//!
//! for row in session.flat_profile().by_self_time().iter().take(10) {
//!     println!("{:6.2}% {}", row.self_time_pct, session.function_table().name(row.function_id));
//! }
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod domain;
pub mod export;
pub mod format;
pub mod logging;
pub mod session;
pub mod symbolization;

pub use config::SessionConfig;
pub use logging::SessionLog;
pub use session::{ProfileSession, SessionBuilder};
