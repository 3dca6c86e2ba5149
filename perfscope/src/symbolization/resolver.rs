//! Symbol merging and function table construction
//!
//! ```text
//! nm <binary> ─┐
//! kallsyms ────┤
//! debug libs ──┼──▶ SymbolTable ──▶ placeholders for ──▶ FunctionTable
//! host lines ──┘    (stable sort)    unmapped addresses   (hit entries only)
//! ```

use super::memory_maps::MemoryMapIndex;
use super::symbol_source::{load_symbols, NmProcess, SymbolFile, SymbolSource};
use super::symbol_table::{FunctionEntry, FunctionKind, FunctionTable, SymbolTable};
use crate::config::SessionConfig;
use crate::format::Record;
use crate::logging::SessionLog;
use perfscope_common::{
    is_context_marker, is_kernel_address, PERF_RECORD_MISC_CPUMODE_MASK, PERF_RECORD_MISC_KERNEL,
};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Output of symbol resolution
#[derive(Debug)]
pub struct ResolvedSymbols {
    pub symbols: SymbolTable,
    pub functions: FunctionTable,
    pub memory_maps: MemoryMapIndex,
}

pub struct SymbolResolver<'a> {
    config: &'a SessionConfig,
    log: SessionLog,
}

impl<'a> SymbolResolver<'a> {
    #[must_use]
    pub fn new(config: &'a SessionConfig, log: SessionLog) -> Self {
        Self { config, log }
    }

    /// Merge every symbol source and build the function table for `records`
    ///
    /// Source failures are logged and skipped; this never fails.
    pub fn resolve(
        &self,
        binary: Option<&Path>,
        host_sources: &mut [Box<dyn SymbolSource>],
        records: &[Record],
    ) -> ResolvedSymbols {
        let mut memory_maps = MemoryMapIndex::new(self.log.clone());
        for (start, length, filename) in records.iter().filter_map(Record::mapping) {
            memory_maps.add_mapping(start, length, filename);
        }

        let mut symbols = SymbolTable::new();
        let mut total = 0;

        match binary {
            Some(binary) => {
                let mut nm = NmProcess::new(self.config.nm_program.clone(), binary);
                total += self.load_source(&mut nm, &mut symbols);
            }
            None => self.log.info(format_args!("No application binary given, skipping its symbols")),
        }

        if let Some(kallsyms) = &self.config.kernel_symbols {
            total += self.load_source(&mut SymbolFile::kernel(kallsyms), &mut symbols);
        }

        if let Some(root) = &self.config.debug_library_root {
            for (filename, start) in memory_maps.distinct_files() {
                let path = debug_library_path(root, filename);
                if !path.is_file() {
                    continue;
                }
                let mut nm =
                    NmProcess::new(self.config.nm_program.clone(), path).with_base_address(start);
                total += self.load_source(&mut nm, &mut symbols);
            }
        }

        for source in host_sources.iter_mut() {
            total += self.load_source(source.as_mut(), &mut symbols);
        }

        symbols.sort();
        self.log.info(format_args!("Loaded {total} symbols from available sources"));

        let placeholders = self.register_placeholders(records, &mut symbols, &mut memory_maps);
        if placeholders > 0 {
            self.log.info(format_args!("Registered {placeholders} placeholder(s) for unmapped addresses"));
        }

        let functions = build_function_table(records, &symbols);
        self.log.info(format_args!(
            "Function table holds {} of {} symbols",
            functions.len(),
            symbols.len()
        ));

        ResolvedSymbols { symbols, functions, memory_maps }
    }

    fn load_source(&self, source: &mut dyn SymbolSource, symbols: &mut SymbolTable) -> usize {
        let description = source.describe();
        match load_symbols(source, symbols) {
            Ok(count) => {
                self.log.info(format_args!("Loaded {count} symbols from {description}"));
                count
            }
            Err(err) => {
                self.log.error(format_args!("Symbol source {description} failed: {err}"));
                0
            }
        }
    }

    /// Make sure every sampled address resolves to some entry
    ///
    /// Addresses outside all mappings get a synthetic region and an
    /// `unresolved` entry at its start, unless they already resolve to a
    /// kernel symbol. Addresses below every symbol get a placeholder too.
    /// Kernel addresses without a kernel symbol get a `kernel` placeholder
    /// so they stay out of the views.
    fn register_placeholders(
        &self,
        records: &[Record],
        symbols: &mut SymbolTable,
        memory_maps: &mut MemoryMapIndex,
    ) -> usize {
        let width = self.config.unresolved_region_width;
        let kernel_ips = kernel_mode_ips(records);
        let mut added = 0;

        for address in sampled_addresses(records) {
            let resolved = symbols.lookup(address);
            let needs_placeholder = match resolved {
                None => true,
                Some(entry) => !entry.is_kernel() && !memory_maps.is_within_mapping(address),
            };
            if !needs_placeholder {
                continue;
            }

            let (name, kind) = if is_kernel_address(address) || kernel_ips.contains(&address) {
                (format!("[kernel] 0x{address:x}"), FunctionKind::Kernel)
            } else {
                (memory_maps.placeholder_name(address), FunctionKind::Unresolved)
            };
            let region = memory_maps.add_synthetic(address, width);
            self.log.debug(format_args!(
                "No mapping covers 0x{address:x}, registered {name} at 0x{:x}",
                region.start
            ));
            symbols.insert_sorted(FunctionEntry::new(region.start, name, kind));
            added += 1;
        }

        added
    }
}

/// `<root><filename>`, so `/usr/lib/debug` + `/lib/libc.so.6` gives
/// `/usr/lib/debug/lib/libc.so.6`
fn debug_library_path(root: &Path, filename: &str) -> PathBuf {
    let mut path = OsString::from(root.as_os_str());
    path.push(filename);
    PathBuf::from(path)
}

/// Sample IPs and call chain entries from index 1 on, context markers excluded
fn sampled_addresses(records: &[Record]) -> impl Iterator<Item = u64> + '_ {
    records.iter().filter_map(Record::as_sample).flat_map(|sample| {
        std::iter::once(sample.ip)
            .chain(sample.callchain.iter().skip(1).copied())
            .filter(|&addr| !is_context_marker(addr))
    })
}

/// IPs of samples whose header marks them as taken in kernel mode
fn kernel_mode_ips(records: &[Record]) -> BTreeSet<u64> {
    records
        .iter()
        .filter(|record| record.common.misc & PERF_RECORD_MISC_CPUMODE_MASK == PERF_RECORD_MISC_KERNEL)
        .filter_map(|record| record.as_sample().map(|sample| sample.ip))
        .collect()
}

fn build_function_table(records: &[Record], symbols: &SymbolTable) -> FunctionTable {
    let hit: BTreeSet<usize> =
        sampled_addresses(records).filter_map(|addr| symbols.lookup_index(addr)).collect();

    let entries = hit.into_iter().filter_map(|index| symbols.get(index).cloned()).collect();
    FunctionTable::from_sorted(entries)
}
