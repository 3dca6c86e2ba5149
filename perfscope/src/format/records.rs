//! Typed records decoded from the data section
//!
//! Every record carries the same [`RecordCommon`] fields regardless of its
//! kind. Non-sample records get their time, CPU and sample id from the
//! `sample_id_all` trailer; their pid/tid come from the record body.

use crate::domain::{CpuId, Pid, Tid, Timestamp};
use perfscope_common::{
    PERF_RECORD_COMM, PERF_RECORD_EXIT, PERF_RECORD_FORK, PERF_RECORD_MMAP, PERF_RECORD_MMAP2,
    PERF_RECORD_SAMPLE,
};
use std::fmt;

/// Kinds of record the decoder understands; everything else is skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Mmap,
    Comm,
    Exit,
    Fork,
    Sample,
    Mmap2,
}

impl RecordKind {
    /// Map an on-disk record type to a supported kind
    #[must_use]
    pub fn from_raw(record_type: u32) -> Option<Self> {
        match record_type {
            PERF_RECORD_MMAP => Some(Self::Mmap),
            PERF_RECORD_COMM => Some(Self::Comm),
            PERF_RECORD_EXIT => Some(Self::Exit),
            PERF_RECORD_FORK => Some(Self::Fork),
            PERF_RECORD_SAMPLE => Some(Self::Sample),
            PERF_RECORD_MMAP2 => Some(Self::Mmap2),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_raw(self) -> u32 {
        match self {
            Self::Mmap => PERF_RECORD_MMAP,
            Self::Comm => PERF_RECORD_COMM,
            Self::Exit => PERF_RECORD_EXIT,
            Self::Fork => PERF_RECORD_FORK,
            Self::Sample => PERF_RECORD_SAMPLE,
            Self::Mmap2 => PERF_RECORD_MMAP2,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mmap => "MMAP",
            Self::Comm => "COMM",
            Self::Exit => "EXIT",
            Self::Fork => "FORK",
            Self::Sample => "SAMPLE",
            Self::Mmap2 => "MMAP2",
        };
        f.write_str(name)
    }
}

/// Fields shared by every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordCommon {
    pub pid: Pid,
    pub tid: Tid,
    pub cpu: CpuId,
    pub time: Timestamp,
    /// Position of the record in the data section, counting skipped records
    pub sequence: u64,
    /// Sample id from the record, if the sample format carries one
    pub sample_id: Option<u64>,
    /// Index of the attribute the sample id correlates to
    pub attr_index: Option<usize>,
    /// `misc` bits from the record header (CPU mode etc.)
    pub misc: u16,
}

/// A mapped executable region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmapRecord {
    pub start: u64,
    pub length: u64,
    pub page_offset: u64,
    pub filename: String,
}

/// A mapped region with device and inode information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mmap2Record {
    pub start: u64,
    pub length: u64,
    pub page_offset: u64,
    pub major: u32,
    pub minor: u32,
    pub inode: u64,
    pub inode_generation: u64,
    pub protection: u32,
    pub flags: u32,
    pub filename: String,
}

/// Parent of a forked or exited thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRecord {
    pub parent_pid: Pid,
    pub parent_tid: Tid,
}

/// One profiling sample
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleRecord {
    pub ip: u64,
    pub period: u64,
    /// Innermost first; entry 0 is the stopper and entry 1 the sampled frame
    pub callchain: Vec<u64>,
    pub addr: Option<u64>,
    pub stream_id: Option<u64>,
    pub raw: Vec<u8>,
}

impl SampleRecord {
    /// Call chain entries that name ancestors of the sampled frame
    ///
    /// Skips the stopper, the sampled frame itself, and context markers.
    pub fn ancestors(&self) -> impl Iterator<Item = u64> + '_ {
        self.callchain
            .iter()
            .skip(2)
            .copied()
            .filter(|&addr| !perfscope_common::is_context_marker(addr))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordBody {
    Mmap(MmapRecord),
    Mmap2(Mmap2Record),
    Comm { name: String },
    Fork(TaskRecord),
    Exit(TaskRecord),
    Sample(SampleRecord),
}

/// A decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub common: RecordCommon,
    pub body: RecordBody,
}

impl Record {
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self.body {
            RecordBody::Mmap(_) => RecordKind::Mmap,
            RecordBody::Mmap2(_) => RecordKind::Mmap2,
            RecordBody::Comm { .. } => RecordKind::Comm,
            RecordBody::Fork(_) => RecordKind::Fork,
            RecordBody::Exit(_) => RecordKind::Exit,
            RecordBody::Sample(_) => RecordKind::Sample,
        }
    }

    #[must_use]
    pub fn as_sample(&self) -> Option<&SampleRecord> {
        match &self.body {
            RecordBody::Sample(sample) => Some(sample),
            _ => None,
        }
    }

    /// Mapping start, length and filename for MMAP and MMAP2 records
    #[must_use]
    pub fn mapping(&self) -> Option<(u64, u64, &str)> {
        match &self.body {
            RecordBody::Mmap(m) => Some((m.start, m.length, m.filename.as_str())),
            RecordBody::Mmap2(m) => Some((m.start, m.length, m.filename.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfscope_common::{PERF_CONTEXT_USER, PERF_RECORD_LOST};

    #[test]
    fn test_record_kind_from_raw() {
        assert_eq!(RecordKind::from_raw(PERF_RECORD_SAMPLE), Some(RecordKind::Sample));
        assert_eq!(RecordKind::from_raw(PERF_RECORD_MMAP2), Some(RecordKind::Mmap2));
        assert_eq!(RecordKind::from_raw(PERF_RECORD_LOST), None);
        assert_eq!(RecordKind::from_raw(68), None);
        assert_eq!(RecordKind::Fork.as_raw(), PERF_RECORD_FORK);
    }

    #[test]
    fn test_ancestors_skip_stopper_self_and_markers() {
        let sample = SampleRecord {
            ip: 0x1010,
            callchain: vec![PERF_CONTEXT_USER, 0x1010, 0x2020, PERF_CONTEXT_USER, 0x3030],
            ..SampleRecord::default()
        };
        let ancestors: Vec<u64> = sample.ancestors().collect();
        assert_eq!(ancestors, vec![0x2020, 0x3030]);
    }

    #[test]
    fn test_mapping_accessor() {
        let record = Record {
            common: RecordCommon::default(),
            body: RecordBody::Mmap(MmapRecord {
                start: 0x40_0000,
                length: 0x1000,
                page_offset: 0,
                filename: "/usr/bin/app".to_string(),
            }),
        };
        assert_eq!(record.kind(), RecordKind::Mmap);
        assert_eq!(record.mapping(), Some((0x40_0000, 0x1000, "/usr/bin/app")));
        assert!(record.as_sample().is_none());
    }
}
