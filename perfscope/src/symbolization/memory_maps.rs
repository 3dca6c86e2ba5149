//! Mapped address ranges reported by MMAP/MMAP2 records
//!
//! Real mappings come from the trace. When a sampled address falls outside
//! every known mapping, a small synthetic region is registered around it so
//! repeated samples at nearby addresses share one placeholder.

use crate::logging::SessionLog;
use std::path::Path;

/// Half-open address range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Range of `length` bytes starting at `start`, or `None` if empty or overflowing
    #[must_use]
    pub fn with_length(start: u64, length: u64) -> Option<Self> {
        if length == 0 {
            return None;
        }
        let end = start.checked_add(length)?;
        Some(Self { start, end })
    }

    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }
}

/// A mapped region and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub range: MemoryRange,
    /// Backing file, `None` for synthetic regions
    pub filename: Option<String>,
}

#[derive(Debug)]
pub struct MemoryMapIndex {
    regions: Vec<MemoryRegion>,
    log: SessionLog,
}

impl MemoryMapIndex {
    #[must_use]
    pub fn new(log: SessionLog) -> Self {
        Self { regions: Vec::new(), log }
    }

    /// Register a mapping from the trace
    ///
    /// Zero-length and overflowing mappings are rejected and logged.
    pub fn add_mapping(&mut self, start: u64, length: u64, filename: &str) -> bool {
        let Some(range) = MemoryRange::with_length(start, length) else {
            self.log.warn(format_args!(
                "Ignoring invalid mapping of {filename}: start 0x{start:x}, length 0x{length:x}"
            ));
            return false;
        };

        self.log.debug(format_args!(
            "Mapping 0x{:x} - 0x{:x} (size: {} KB) {filename}",
            range.start,
            range.end,
            range.len() / 1024
        ));
        self.regions.push(MemoryRegion { range, filename: Some(filename.to_string()) });
        true
    }

    #[must_use]
    pub fn is_within_mapping(&self, addr: u64) -> bool {
        self.regions.iter().any(|region| region.range.contains(addr))
    }

    /// Register a synthetic region of `width` bytes around `addr`
    ///
    /// The region starts `width / 2` below the address, clamped at zero.
    pub fn add_synthetic(&mut self, addr: u64, width: u64) -> MemoryRange {
        let width = width.max(1);
        let start = addr.saturating_sub(width / 2);
        let end = start.saturating_add(width).max(addr.saturating_add(1));
        let range = MemoryRange { start, end };
        self.regions.push(MemoryRegion { range, filename: None });
        range
    }

    /// Real mapping with the greatest start address at or below `addr`
    #[must_use]
    pub fn nearest_lower_file_mapping(&self, addr: u64) -> Option<&MemoryRegion> {
        self.regions
            .iter()
            .filter(|region| region.filename.is_some() && region.range.start <= addr)
            .max_by_key(|region| region.range.start)
    }

    /// Placeholder name for an address no symbol source covers
    ///
    /// `<basename of nearest lower mapping>+0x<offset>`, or
    /// `[unknown] 0x<addr>` when no mapping lies below the address.
    #[must_use]
    pub fn placeholder_name(&self, addr: u64) -> String {
        self.nearest_lower_file_mapping(addr)
            .and_then(|region| {
                let filename = region.filename.as_deref()?;
                let basename = Path::new(filename)
                    .file_name()
                    .map_or_else(|| filename.to_string(), |n| n.to_string_lossy().into_owned());
                Some(format!("{basename}+0x{:x}", addr - region.range.start))
            })
            .unwrap_or_else(|| format!("[unknown] 0x{addr:x}"))
    }

    /// Distinct backing filenames of real mappings, in first-seen order,
    /// with the start of the first mapping of each
    #[must_use]
    pub fn distinct_files(&self) -> Vec<(&str, u64)> {
        let mut files: Vec<(&str, u64)> = Vec::new();
        for region in &self.regions {
            if let Some(name) = region.filename.as_deref() {
                if !files.iter().any(|(seen, _)| *seen == name) {
                    files.push((name, region.range.start));
                }
            }
        }
        files
    }

    #[must_use]
    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }
}
