//! Line-oriented symbol sources
//!
//! `nm` output and `/proc/kallsyms` share one line shape:
//!
//! ```text
//! 0000000000401136 T main
//! ffffffff81000000 T _stext
//! ffffffffc0a01000 t nf_hook_slow	[nf_tables]
//! ```
//!
//! A [`SymbolSource`] only has to produce those lines; [`parse_symbol_line`]
//! turns them into [`FunctionEntry`] values with the source's base address
//! and kind override applied.

use super::symbol_table::{FunctionEntry, FunctionKind, SymbolTable};
use crate::domain::SymbolSourceError;
use rustc_demangle::demangle;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Lines shorter than this cannot hold an address, a type and a name
const MIN_LINE_LEN: usize = 8;

/// Producer of symbol text lines
pub trait SymbolSource {
    /// Human-readable description for log messages
    fn describe(&self) -> String;

    /// Added to every parsed address
    fn base_address(&self) -> u64 {
        0
    }

    /// Kind forced onto every accepted line
    fn kind_override(&self) -> Option<FunctionKind> {
        None
    }

    /// Feed every line to `visit`, draining the source to its end
    ///
    /// # Errors
    /// Fails if the source cannot be opened or started, or fails while read
    fn for_each_line(&mut self, visit: &mut dyn FnMut(&str)) -> Result<(), SymbolSourceError>;
}

/// Demangle a Rust symbol name; other names pass through unchanged
#[must_use]
pub fn demangle_symbol(symbol: &str) -> String {
    format!("{:#}", demangle(symbol))
}

/// Map an `nm` type character to a kind; `None` for data symbols
fn kind_for_type_char(type_char: char) -> Option<FunctionKind> {
    match type_char {
        'T' | 't' => Some(FunctionKind::Text),
        'W' | 'w' | 'V' | 'v' => Some(FunctionKind::Weak),
        'D' | 'd' | 'R' | 'r' | 'B' | 'b' => None,
        _ => Some(FunctionKind::Misc),
    }
}

/// Parse one `<hex address> <type char> <name>` line
///
/// Returns `None` for short, unparsable, or data-symbol lines.
#[must_use]
pub fn parse_symbol_line(
    line: &str,
    base_address: u64,
    kind_override: Option<FunctionKind>,
) -> Option<FunctionEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.len() < MIN_LINE_LEN {
        return None;
    }

    let (address, rest) = line.split_once(char::is_whitespace)?;
    let address = u64::from_str_radix(address, 16).ok()?;

    let mut rest = rest.trim_start().chars();
    let type_char = rest.next()?;
    let name = rest.as_str().trim();
    if name.is_empty() {
        return None;
    }

    let kind = kind_for_type_char(type_char)?;
    let kind = kind_override.unwrap_or(kind);

    Some(FunctionEntry::new(address.wrapping_add(base_address), demangle_symbol(name), kind))
}

/// Drain a source into the table, returning how many entries were added
///
/// Entries parsed before a failure stay in the table.
///
/// # Errors
/// Propagates the source's failure
pub fn load_symbols(
    source: &mut dyn SymbolSource,
    table: &mut SymbolTable,
) -> Result<usize, SymbolSourceError> {
    let base = source.base_address();
    let kind_override = source.kind_override();
    let mut added = 0;

    source.for_each_line(&mut |line| {
        if let Some(entry) = parse_symbol_line(line, base, kind_override) {
            table.push_unsorted(entry);
            added += 1;
        }
    })?;

    Ok(added)
}

fn drain_lines<R: Read>(reader: R, visit: &mut dyn FnMut(&str)) -> std::io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        visit(&String::from_utf8_lossy(&buf));
    }
}

/// Symbols dumped by a spawned `nm -a -C <binary>`
#[derive(Debug, Clone)]
pub struct NmProcess {
    program: String,
    binary: PathBuf,
    base_address: u64,
}

impl NmProcess {
    pub fn new(program: impl Into<String>, binary: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), binary: binary.into(), base_address: 0 }
    }

    /// Relocate every symbol by `base_address` (for shared objects)
    #[must_use]
    pub fn with_base_address(mut self, base_address: u64) -> Self {
        self.base_address = base_address;
        self
    }
}

impl SymbolSource for NmProcess {
    fn describe(&self) -> String {
        format!("{} -a -C {}", self.program, self.binary.display())
    }

    fn base_address(&self) -> u64 {
        self.base_address
    }

    fn for_each_line(&mut self, visit: &mut dyn FnMut(&str)) -> Result<(), SymbolSourceError> {
        let mut child = Command::new(&self.program)
            .arg("-a")
            .arg("-C")
            .arg(&self.binary)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SymbolSourceError::Spawn { program: self.program.clone(), source })?;

        let drained = match child.stdout.take() {
            Some(stdout) => drain_lines(stdout, visit),
            None => Ok(()),
        };

        // Always reap the child, even when reading failed.
        let status = child.wait()?;
        drained?;

        if status.success() {
            Ok(())
        } else {
            Err(SymbolSourceError::ProcessFailed { program: self.program.clone(), status })
        }
    }
}

/// Symbols read from a text file such as `/proc/kallsyms`
#[derive(Debug, Clone)]
pub struct SymbolFile {
    path: PathBuf,
    kind_override: Option<FunctionKind>,
}

impl SymbolFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), kind_override: None }
    }

    /// Kernel symbol file; every symbol is classified as kernel
    pub fn kernel(path: impl Into<PathBuf>) -> Self {
        Self { kind_override: Some(FunctionKind::Kernel), ..Self::new(path) }
    }
}

impl SymbolSource for SymbolFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn kind_override(&self) -> Option<FunctionKind> {
        self.kind_override
    }

    fn for_each_line(&mut self, visit: &mut dyn FnMut(&str)) -> Result<(), SymbolSourceError> {
        let file = File::open(&self.path).map_err(|source| SymbolSourceError::Open {
            path: self.path.display().to_string(),
            source,
        })?;
        drain_lines(file, visit)?;
        Ok(())
    }
}

/// Symbol lines supplied directly by the host
#[derive(Debug, Clone, Default)]
pub struct StaticSymbols {
    label: String,
    lines: Vec<String>,
    kind_override: Option<FunctionKind>,
}

impl StaticSymbols {
    pub fn new<I, S>(label: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            lines: lines.into_iter().map(Into::into).collect(),
            kind_override: None,
        }
    }

    #[must_use]
    pub fn with_kind_override(mut self, kind: FunctionKind) -> Self {
        self.kind_override = Some(kind);
        self
    }
}

impl SymbolSource for StaticSymbols {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn kind_override(&self) -> Option<FunctionKind> {
        self.kind_override
    }

    fn for_each_line(&mut self, visit: &mut dyn FnMut(&str)) -> Result<(), SymbolSourceError> {
        for line in &self.lines {
            visit(line);
        }
        Ok(())
    }
}
