//! # Shared perf.data ABI Definitions
//!
//! Constants and plain `#[repr(C)]` structures describing the on-disk layout
//! of `perf record` files (format version 2, magic `PERFILE2`). The decoder in
//! the `perfscope` crate reads these fields one by one with explicit
//! little-endian reads, so the structures here document layout and sizes
//! rather than being transmuted from raw bytes.
//!
//! ## File Layout
//!
//! ```text
//! ┌──────────────────────────────┐ offset 0
//! │ PerfFileHeader (104 bytes)   │  magic, sizes, section table, feature bits
//! ├──────────────────────────────┤ header.attrs.offset
//! │ [perf_event_attr + ids] × N  │  attr_size bytes each
//! ├──────────────────────────────┤ header.event_types.offset (optional)
//! │ [event id + name[64]] × M    │
//! ├──────────────────────────────┤ header.data.offset
//! │ PerfEventHeader + payload    │  variable-length records
//! │ ...                          │
//! └──────────────────────────────┘
//! ```
//!
//! ## Key Types
//!
//! - [`PerfFileHeader`] - Fixed header at the start of every file
//! - [`PerfFileSection`] - `{offset, size}` pair locating a section
//! - [`PerfEventHeader`] - Prefix of every data-section record

#![no_std]

// ============================================================================
// File Header
// ============================================================================

/// Magic bytes at offset 0 of every version 2 perf file.
pub const PERF_FILE_MAGIC: [u8; 8] = *b"PERFILE2";

/// Size of the magic field in bytes.
pub const PERF_FILE_MAGIC_LEN: usize = 8;

/// Number of feature flag bits stored in the header.
pub const HEADER_FEATURE_BITS: usize = 256;

/// Size of [`PerfFileHeader`] on disk: magic + size + attr_size + 3 sections + 32 flag bytes.
pub const PERF_FILE_HEADER_SIZE: usize = 104;

/// Size of [`PerfFileSection`] on disk.
pub const PERF_FILE_SECTION_SIZE: usize = 16;

/// `{offset, size}` pair locating a section within the file.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerfFileSection {
    /// Offset from the start of the file
    pub offset: u64,
    /// Size of the section in bytes
    pub size: u64,
}

impl PerfFileSection {
    /// A section is absent when both its offset and size are zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.offset == 0 && self.size == 0
    }

    /// First byte past the end of the section.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }
}

/// Fixed header at the start of a perf file.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerfFileHeader {
    /// Must equal [`PERF_FILE_MAGIC`]
    pub magic: [u8; PERF_FILE_MAGIC_LEN],

    /// Size of this header (104 for seekable files)
    pub size: u64,

    /// Size of one attribute record: `perf_event_attr` plus a trailing
    /// [`PerfFileSection`] locating its correlated sample ids
    pub attr_size: u64,

    /// Attribute section
    pub attrs: PerfFileSection,

    /// Data section (the event stream)
    pub data: PerfFileSection,

    /// Event-type section (optional, legacy)
    pub event_types: PerfFileSection,

    /// 256-bit feature bitmap
    pub flags: [u64; HEADER_FEATURE_BITS / 64],
}

// ============================================================================
// Attribute Section
// ============================================================================

/// Smallest `perf_event_attr` revision (`PERF_ATTR_SIZE_VER0`).
///
/// Every field the decoder needs (`config`, `sample_type`, `read_format`,
/// option bits) lives in the first 48 bytes, so any later revision works.
pub const PERF_ATTR_SIZE_VER0: u64 = 64;

/// Byte offset of `perf_event_attr.size` (u32).
pub const ATTR_SIZE_OFFSET: usize = 4;

/// Byte offset of `perf_event_attr.config` (u64).
pub const ATTR_CONFIG_OFFSET: usize = 8;

/// Byte offset of `perf_event_attr.sample_type` (u64).
pub const ATTR_SAMPLE_TYPE_OFFSET: usize = 24;

/// Byte offset of `perf_event_attr.read_format` (u64).
pub const ATTR_READ_FORMAT_OFFSET: usize = 32;

/// Byte offset of the `perf_event_attr` option bitfield (u64).
pub const ATTR_OPTIONS_OFFSET: usize = 40;

/// `perf_event_attr.sample_id_all`: non-sample records carry a sample id trailer.
pub const ATTR_FLAG_SAMPLE_ID_ALL: u64 = 1 << 18;

/// Length of an event name in the event-type section.
pub const MAX_EVENT_NAME: usize = 64;

/// Size of one event-type entry: `u64` event id followed by the name.
pub const EVENT_TYPE_ENTRY_SIZE: usize = 8 + MAX_EVENT_NAME;

// ============================================================================
// Sample Format Bits (perf_event_attr.sample_type)
// ============================================================================

/// Instruction pointer
pub const PERF_SAMPLE_IP: u64 = 1 << 0;
/// `{ u32 pid, tid; }`
pub const PERF_SAMPLE_TID: u64 = 1 << 1;
/// Timestamp in nanoseconds
pub const PERF_SAMPLE_TIME: u64 = 1 << 2;
/// Data address
pub const PERF_SAMPLE_ADDR: u64 = 1 << 3;
/// Counter read values (not supported by the decoder)
pub const PERF_SAMPLE_READ: u64 = 1 << 4;
/// `{ u64 nr; u64 ips[nr]; }`
pub const PERF_SAMPLE_CALLCHAIN: u64 = 1 << 5;
/// Sample id linking a record to its attribute
pub const PERF_SAMPLE_ID: u64 = 1 << 6;
/// `{ u32 cpu, res; }`
pub const PERF_SAMPLE_CPU: u64 = 1 << 7;
/// Sampling period
pub const PERF_SAMPLE_PERIOD: u64 = 1 << 8;
/// Stream id
pub const PERF_SAMPLE_STREAM_ID: u64 = 1 << 9;
/// `{ u32 size; char data[size]; }` padded to 8 bytes
pub const PERF_SAMPLE_RAW: u64 = 1 << 10;
/// Sample id at a fixed position (first in samples, last in trailers)
pub const PERF_SAMPLE_IDENTIFIER: u64 = 1 << 16;

// ============================================================================
// Data Section Records
// ============================================================================

/// Size of [`PerfEventHeader`] on disk.
pub const PERF_EVENT_HEADER_SIZE: usize = 8;

/// Prefix of every record in the data section.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerfEventHeader {
    /// Record type (`PERF_RECORD_*`)
    pub record_type: u32,
    /// CPU mode and type-specific flags
    pub misc: u16,
    /// Total record size including this header
    pub size: u16,
}

/// Memory mapping of an executable region
pub const PERF_RECORD_MMAP: u32 = 1;
/// Lost events notification (skipped)
pub const PERF_RECORD_LOST: u32 = 2;
/// Thread command name change
pub const PERF_RECORD_COMM: u32 = 3;
/// Thread exit
pub const PERF_RECORD_EXIT: u32 = 4;
/// Throttle notification (skipped)
pub const PERF_RECORD_THROTTLE: u32 = 5;
/// Unthrottle notification (skipped)
pub const PERF_RECORD_UNTHROTTLE: u32 = 6;
/// Thread creation
pub const PERF_RECORD_FORK: u32 = 7;
/// Counter read (skipped)
pub const PERF_RECORD_READ: u32 = 8;
/// Profiling sample
pub const PERF_RECORD_SAMPLE: u32 = 9;
/// Memory mapping with device/inode information
pub const PERF_RECORD_MMAP2: u32 = 10;

/// First user-space (perf tool synthesized) record type.
pub const PERF_RECORD_USER_TYPE_START: u32 = 64;

/// Fixed length of the command name in a COMM record.
pub const COMM_NAME_LEN: usize = 16;

// ============================================================================
// Callchain Context Markers
// ============================================================================

/// Callchain entries at or above this value are context markers
/// (`PERF_CONTEXT_HV`, `PERF_CONTEXT_KERNEL`, `PERF_CONTEXT_USER`, ...),
/// not instruction addresses.
pub const PERF_CONTEXT_MAX: u64 = u64::MAX - 4094;

/// Marker preceding user-space frames in a callchain.
pub const PERF_CONTEXT_USER: u64 = u64::MAX - 511;

/// Marker preceding kernel frames in a callchain.
pub const PERF_CONTEXT_KERNEL: u64 = u64::MAX - 127;

/// Returns true if a callchain entry is a context marker rather than an address.
#[must_use]
pub const fn is_context_marker(addr: u64) -> bool {
    addr >= PERF_CONTEXT_MAX
}

/// Mask selecting the CPU mode from a record header's `misc` bits.
pub const PERF_RECORD_MISC_CPUMODE_MASK: u16 = 7;

/// CPU mode of a sample taken while running kernel code.
pub const PERF_RECORD_MISC_KERNEL: u16 = 1;

/// Lowest address of the kernel half of a 64-bit address space.
pub const KERNEL_SPACE_START: u64 = 0xffff_8000_0000_0000;

/// Returns true for addresses in the kernel half, context markers excluded.
#[must_use]
pub const fn is_kernel_address(addr: u64) -> bool {
    addr >= KERNEL_SPACE_START && !is_context_marker(addr)
}
