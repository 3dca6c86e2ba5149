//! perf.data (version 2) decoding
//!
//! - [`header`]: fixed header, attribute and event-type sections
//! - [`sample_extractor`]: bitmask-driven decode of sample payloads and
//!   `sample_id_all` trailers
//! - [`records`]: typed records produced from the data section
//! - [`parser`]: drives the whole load and orders records by time

pub mod header;
pub mod parser;
pub mod records;
pub mod sample_extractor;

pub use header::EventAttribute;
pub use parser::{FileParser, ParsedFile};
pub use records::{
    Mmap2Record, MmapRecord, Record, RecordBody, RecordCommon, RecordKind, SampleRecord,
    TaskRecord,
};
pub use sample_extractor::{SampleExtractor, SampleFields};
