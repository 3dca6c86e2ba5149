//! Profiling session: one loaded perf file and every view derived from it
//!
//! ```text
//! SessionBuilder ──load()──▶ FileParser ──▶ SymbolResolver ──▶ builders ──▶ ProfileSession
//!   config, logger,            records        function table     flat profile
//!   binary, extra sources                                         call graph / tree
//!                                                                 heat map
//! ```
//!
//! A load runs the whole pipeline to completion or returns the first fatal
//! error. There is no partially loaded session.

use crate::analysis::{
    CallGraph, CallGraphBuilder, CallTree, CallTreeBuilder, FlatProfile, FlatProfileBuilder,
    HeatMap, HeatMapBuilder,
};
use crate::config::SessionConfig;
use crate::domain::{LoadError, Tid};
use crate::format::{EventAttribute, FileParser, ParsedFile, Record, RecordBody};
use crate::logging::SessionLog;
use crate::symbolization::{FunctionTable, SymbolResolver, SymbolSource, SymbolTable};
use perfscope_common::PerfFileHeader;
use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

/// Name reported by [`ProfileSession::name`]
pub const SESSION_NAME: &str = "perfscope";

/// Views a session produces
pub const FEATURES: &[&str] = &["flat-profile", "call-graph", "call-tree", "heat-map"];

#[derive(Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    log: SessionLog,
    binary: Option<PathBuf>,
    sources: Vec<Box<dyn SymbolSource>>,
}

impl SessionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn logger(mut self, log: SessionLog) -> Self {
        self.log = log;
        self
    }

    /// Application binary whose symbols are dumped with `nm`
    #[must_use]
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Extra symbol source, consulted after the built-in ones
    #[must_use]
    pub fn symbol_source(mut self, source: Box<dyn SymbolSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Load and analyze a perf file from disk
    ///
    /// # Errors
    /// Returns the first fatal decode error
    pub fn load(self, path: &Path) -> Result<ProfileSession, LoadError> {
        let parsed = FileParser::new(self.log.clone()).parse_file(path)?;
        Ok(self.analyze(parsed))
    }

    /// Load and analyze a perf file from a seekable reader
    ///
    /// # Errors
    /// Returns the first fatal decode error
    pub fn load_from<R: Read + Seek>(self, reader: &mut R) -> Result<ProfileSession, LoadError> {
        let parsed = FileParser::new(self.log.clone()).parse(reader)?;
        Ok(self.analyze(parsed))
    }

    fn analyze(mut self, parsed: ParsedFile) -> ProfileSession {
        let ParsedFile { header, attributes, records, skipped_records } = parsed;

        let resolved = SymbolResolver::new(&self.config, self.log.clone()).resolve(
            self.binary.as_deref(),
            &mut self.sources,
            &records,
        );
        let functions = resolved.functions;

        let mut flat_profile = FlatProfileBuilder::new(&functions).build(&records);
        let call_graph = CallGraphBuilder::new(&functions).build(&records, &mut flat_profile);
        let call_tree = CallTreeBuilder::new(&functions, self.config.prune_threshold).build(&records);
        let heat_map = HeatMapBuilder::new(&functions, self.config.heat_map_bucket_ms).build(&records);

        self.log.info(format_args!(
            "Profile ready: {} functions, {} call graph edges, {} call tree nodes, {} heat map buckets",
            functions.len(),
            call_graph.edge_count(),
            call_tree.len(),
            heat_map.bucket_count()
        ));

        let thread_names = thread_names(&records);

        ProfileSession {
            config: self.config,
            header,
            attributes,
            records,
            skipped_records,
            symbols: resolved.symbols,
            functions,
            flat_profile,
            call_graph,
            call_tree,
            heat_map,
            thread_names,
        }
    }
}

/// Last command name seen for each thread
fn thread_names(records: &[Record]) -> BTreeMap<Tid, String> {
    records
        .iter()
        .filter_map(|record| match &record.body {
            RecordBody::Comm { name } => Some((record.common.tid, name.clone())),
            _ => None,
        })
        .collect()
}

#[derive(Debug)]
pub struct ProfileSession {
    config: SessionConfig,
    header: PerfFileHeader,
    attributes: Vec<EventAttribute>,
    records: Vec<Record>,
    skipped_records: u64,
    symbols: SymbolTable,
    functions: FunctionTable,
    flat_profile: FlatProfile,
    call_graph: CallGraph,
    call_tree: CallTree,
    heat_map: HeatMap,
    thread_names: BTreeMap<Tid, String>,
}

impl ProfileSession {
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        SESSION_NAME
    }

    #[must_use]
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    #[must_use]
    pub fn features(&self) -> &'static [&'static str] {
        FEATURES
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn header(&self) -> &PerfFileHeader {
        &self.header
    }

    #[must_use]
    pub fn attributes(&self) -> &[EventAttribute] {
        &self.attributes
    }

    /// Decoded records in time order
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn skipped_records(&self) -> u64 {
        self.skipped_records
    }

    /// Every symbol from every source, including placeholders
    #[must_use]
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }

    #[must_use]
    pub fn function_table(&self) -> &FunctionTable {
        &self.functions
    }

    #[must_use]
    pub fn flat_profile(&self) -> &FlatProfile {
        &self.flat_profile
    }

    #[must_use]
    pub fn call_graph(&self) -> &CallGraph {
        &self.call_graph
    }

    #[must_use]
    pub fn call_tree(&self) -> &CallTree {
        &self.call_tree
    }

    #[must_use]
    pub fn heat_map(&self) -> &HeatMap {
        &self.heat_map
    }

    #[must_use]
    pub fn thread_names(&self) -> &BTreeMap<Tid, String> {
        &self.thread_names
    }
}

/// Sessions over in-memory records for unit tests of session consumers
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::analysis::fixtures::{LEAF, MAIN};
    use crate::format::{MmapRecord, RecordCommon};
    use crate::symbolization::StaticSymbols;

    /// Analyze `samples` with `main`, `work` and `leaf` mapped from `/usr/bin/app`
    pub fn session(samples: Vec<Record>) -> ProfileSession {
        let mapping = Record {
            common: RecordCommon::default(),
            body: RecordBody::Mmap(MmapRecord {
                start: MAIN,
                length: LEAF + 0x1000 - MAIN,
                page_offset: 0,
                filename: "/usr/bin/app".to_string(),
            }),
        };
        let mut records = vec![mapping];
        records.extend(samples);

        let parsed = ParsedFile {
            header: PerfFileHeader::default(),
            attributes: Vec::new(),
            records,
            skipped_records: 0,
        };
        let config =
            SessionConfig { kernel_symbols: None, debug_library_root: None, ..SessionConfig::default() };
        SessionBuilder::new()
            .config(config)
            .logger(SessionLog::silent())
            .symbol_source(Box::new(StaticSymbols::new(
                "fixture",
                ["0000000000001000 T main", "0000000000002000 T work", "0000000000003000 T leaf"],
            )))
            .analyze(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::{sample, LEAF, MAIN, WORK};
    use crate::format::RecordCommon;

    #[test]
    fn test_thread_names_keep_latest_comm() {
        let comm = |tid: u32, name: &str| Record {
            common: RecordCommon { tid: Tid(tid), ..RecordCommon::default() },
            body: RecordBody::Comm { name: name.to_string() },
        };
        let records = vec![comm(7, "bash"), comm(8, "worker"), comm(7, "app")];

        let names = thread_names(&records);
        assert_eq!(names.get(&Tid(7)).map(String::as_str), Some("app"));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_analyze_builds_every_view() {
        let session = fixtures::session(vec![
            sample(0, LEAF + 4, &[WORK + 4, MAIN + 4]),
            sample(1, WORK + 4, &[MAIN + 4]),
        ]);

        assert_eq!(session.function_table().len(), 3);
        assert_eq!(session.flat_profile().total_self_time(), 2);
        assert_eq!(session.call_graph().edge_count(), 2);
        assert_eq!(session.call_tree().roots().len(), 1);
        assert_eq!(session.heat_map().bucket_count(), 1);
        assert_eq!(session.records().len(), 3);
        assert_eq!(session.name(), SESSION_NAME);
    }

    #[test]
    fn test_load_from_rejects_garbage() {
        let mut reader = std::io::Cursor::new(vec![0u8; 200]);
        let result = ProfileSession::builder().logger(SessionLog::silent()).load_from(&mut reader);
        assert!(matches!(result, Err(LoadError::BadMagic(_))));
    }
}
