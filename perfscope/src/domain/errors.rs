//! Structured error types for perfscope
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

/// Fatal errors while loading a perf file.
///
/// Any of these aborts the load; no partially constructed session survives.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Not a perf record file (bad magic {0:02x?})")]
    BadMagic([u8; 8]),

    #[error("Unexpected end of file while reading {0}")]
    Truncated(&'static str),

    #[error("Perf file contains no attribute section")]
    NoAttributes,

    #[error("Attribute record size {0} is too small for perf_event_attr")]
    AttrSizeTooSmall(u64),

    #[error("Attribute section size {section_size} is not a multiple of attribute record size {attr_size}")]
    AttrSectionMisaligned { section_size: u64, attr_size: u64 },

    #[error("Attribute {index} declares size {declared}, header expects {expected}")]
    AttrSizeMismatch { index: usize, declared: u64, expected: u64 },

    #[error("Sample format changed during recording (0x{first:x} vs 0x{found:x})")]
    MixedSampleFormat { first: u64, found: u64 },

    #[error("Attribute {0} lacks sample_id_all, records cannot be attributed")]
    MissingSampleIdAll(usize),

    #[error("Event type section size {0} is not a multiple of the entry size")]
    EventTypesMisaligned(u64),

    #[error("Event type {event_id} ({name}) has no matching attribute")]
    UnmatchedEventType { event_id: u64, name: String },

    #[error("Perf file does not contain any profiling data")]
    NoData,

    #[error("Malformed record #{index} at offset {offset}: {reason}")]
    MalformedRecord { index: u64, offset: u64, reason: String },

    #[error(transparent)]
    Sample(#[from] ExtractError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors decoding the optional fields of a single record payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Sample payload truncated while reading {0}")]
    Truncated(&'static str),

    #[error("Read-group sample values are not supported")]
    ReadGroupUnsupported,

    #[error("Callchain length {0} exceeds the record payload")]
    CallchainTooLong(u64),
}

/// Recoverable errors from a symbol source.
///
/// The session logs these and continues with the symbols other sources provided.
#[derive(Error, Debug)]
pub enum SymbolSourceError {
    #[error("Failed to launch {program}: {source}")]
    Spawn { program: String, source: std::io::Error },

    #[error("{program} exited with {status}")]
    ProcessFailed { program: String, status: std::process::ExitStatus },

    #[error("Failed to open symbol file {path}: {source}")]
    Open { path: String, source: std::io::Error },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to serialize report: {0}")]
    SerializationFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_magic_display() {
        let err = LoadError::BadMagic(*b"NOTPERF!");
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn test_mixed_sample_format_display() {
        let err = LoadError::MixedSampleFormat { first: 0x27, found: 0x7 };
        assert_eq!(err.to_string(), "Sample format changed during recording (0x27 vs 0x7)");
    }

    #[test]
    fn test_extract_error_converts_into_load_error() {
        let err: LoadError = ExtractError::ReadGroupUnsupported.into();
        assert!(matches!(err, LoadError::Sample(ExtractError::ReadGroupUnsupported)));
    }
}
